use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{connect, load_settings, CatalogSynchronizer, EntryStatus, MemoryAddressBar};
use shared::domain::{CollectionPage, Entity, EntityId, FilterKey, FilterSet};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured catalog base URL.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads the collection described by an address-bar query.
    List {
        #[arg(long, default_value = "")]
        query: String,
    },
    Search {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long)]
        gender: Option<String>,
    },
    Page {
        page: u32,
        #[arg(long, default_value = "")]
        query: String,
    },
    Show {
        id: i64,
    },
    /// Interactive session reading commands from stdin.
    Browse {
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    debug!(
        base_url = %settings.base_url,
        stale_after_secs = settings.stale_after_secs,
        "explorer: settings loaded"
    );

    match cli.command {
        Command::List { query } => {
            let (sync, bar) = open(&settings, &query)?;
            let page = sync.activate().await?;
            print_page(&sync, &page).await;
            println!("url: {}", bar.current());
        }
        Command::Search {
            query,
            name,
            status,
            species,
            gender,
        } => {
            let (sync, bar) = open(&settings, &query)?;
            let mut filters = FilterSet::new();
            filters.set(FilterKey::Name, name);
            filters.set(FilterKey::Status, status);
            filters.set(FilterKey::Species, species);
            filters.set(FilterKey::Gender, gender);
            let page = sync.submit_filters(filters).await?;
            print_page(&sync, &page).await;
            println!("url: {}", bar.current());
        }
        Command::Page { page, query } => {
            let (sync, bar) = open(&settings, &query)?;
            sync.activate().await?;
            let loaded = sync.go_to_page(page).await?;
            print_page(&sync, &loaded).await;
            println!("url: {}", bar.current());
        }
        Command::Show { id } => {
            let (sync, _bar) = open(&settings, "")?;
            let entry = sync.select_entity(EntityId(id)).await;
            match (entry.payload, entry.error) {
                (Some(entity), _) => print_entity(&entity),
                (None, Some(err)) => bail!(err),
                (None, None) => bail!("character {id} not loaded"),
            }
        }
        Command::Browse { query } => {
            let (sync, bar) = open(&settings, &query)?;
            browse(&sync, &bar).await?;
        }
    }

    Ok(())
}

fn open(
    settings: &client_core::Settings,
    query: &str,
) -> Result<(CatalogSynchronizer, Arc<MemoryAddressBar>)> {
    let bar = Arc::new(MemoryAddressBar::new(query));
    let sync = connect(settings, bar.clone()).context("failed to build catalog client")?;
    Ok((sync, bar))
}

async fn print_page(sync: &CatalogSynchronizer, page: &CollectionPage) {
    let view = sync.view_state().await;
    if page.is_empty() {
        println!("No characters found");
        return;
    }
    println!("{}", page.summary(view.current_page));
    for entity in &page.entities {
        println!(
            "  #{:<4} {:<32} [{}] {} / {}",
            entity.id,
            entity.name,
            entity.status.as_str(),
            entity.species,
            entity.gender.as_str()
        );
    }
}

fn print_entity(entity: &Entity) {
    println!("#{} {}", entity.id, entity.name);
    println!("  status:   {}", entity.status.as_str());
    println!("  species:  {}", entity.species);
    if !entity.subtype.is_empty() {
        println!("  type:     {}", entity.subtype);
    }
    println!("  gender:   {}", entity.gender.as_str());
    println!("  origin:   {}", entity.origin.name);
    println!("  location: {}", entity.location.name);
    println!("  episodes: {}", entity.episode_count());
    println!("  image:    {}", entity.image);
}

async fn browse(sync: &CatalogSynchronizer, bar: &MemoryAddressBar) -> Result<()> {
    match sync.activate().await {
        Ok(page) => print_page(sync, &page).await,
        Err(err) => println!("error: {err}"),
    }
    println!(
        "commands: next | prev | page N | filter KEY=VALUE | search | clear | refresh | show ID | back | quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let outcome = match verb {
            "" => continue,
            "quit" | "exit" => break,
            "next" => sync.next_page().await.map(Some),
            "prev" => sync.previous_page().await.map(Some),
            "page" => match rest.trim().parse::<u32>() {
                Ok(n) => sync.go_to_page(n).await.map(Some),
                Err(_) => {
                    println!("usage: page N");
                    continue;
                }
            },
            "filter" => {
                let parsed = rest
                    .split_once('=')
                    .and_then(|(k, v)| FilterKey::parse(k.trim()).map(|k| (k, v.trim())));
                match parsed {
                    Some((key, value)) => {
                        sync.stage_filter(key, value).await;
                        println!("staged {key}={value}");
                    }
                    None => println!(
                        "usage: filter KEY=VALUE (keys: {})",
                        FilterKey::ALL.map(FilterKey::as_str).join(", ")
                    ),
                }
                continue;
            }
            "search" => sync.submit_staged().await.map(Some),
            "clear" => sync.clear_filters().await.map(Some),
            "refresh" => {
                let report = sync.refresh().await;
                if let Err(err) = &report.outcome {
                    println!("refresh failed: {err}");
                }
                Ok(report.retained)
            }
            "back" => {
                if bar.back().is_none() {
                    println!("no earlier history");
                    continue;
                }
                sync.activate().await.map(Some)
            }
            "show" => {
                match rest.trim().parse::<i64>() {
                    Ok(id) => {
                        let entry = sync.select_entity(EntityId(id)).await;
                        match (entry.status, entry.payload, entry.error) {
                            (_, Some(entity), _) => print_entity(&entity),
                            (EntryStatus::Error, None, Some(err)) => println!("error: {err}"),
                            _ => println!("character {id} not loaded"),
                        }
                    }
                    Err(_) => println!("usage: show ID"),
                }
                continue;
            }
            other => {
                println!("unknown command: {other}");
                continue;
            }
        };

        match outcome {
            Ok(Some(page)) => print_page(sync, &page).await,
            Ok(None) => println!("nothing to show"),
            Err(err) => println!("error: {err}"),
        }
        println!("url: {}", bar.current());
    }

    Ok(())
}
