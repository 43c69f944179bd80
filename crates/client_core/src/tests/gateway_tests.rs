use super::*;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{EntityStatus, FilterKey};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct CatalogServerState {
    queries: Arc<Mutex<Vec<String>>>,
}

fn character_json(id: i64) -> Value {
    json!({
        "id": id,
        "name": "Morty Smith",
        "status": "Alive",
        "species": "Human",
        "type": "",
        "gender": "Male",
        "origin": { "name": "unknown", "url": "" },
        "location": {
            "name": "Citadel of Ricks",
            "url": "https://rickandmortyapi.com/api/location/3"
        },
        "image": format!("https://rickandmortyapi.com/api/character/avatar/{id}.jpeg"),
        "episode": ["https://rickandmortyapi.com/api/episode/1"],
        "url": format!("https://rickandmortyapi.com/api/character/{id}"),
        "created": "2017-11-04T18:50:21.651Z"
    })
}

async fn list_characters(
    State(state): State<CatalogServerState>,
    RawQuery(query): RawQuery,
) -> AxumResponse {
    let query = query.unwrap_or_default();
    state.queries.lock().await.push(query.clone());

    if query.contains("name=nobody") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "There is nothing here" })),
        )
            .into_response();
    }
    if query.contains("name=boom") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if query.contains("name=garbage") {
        return (StatusCode::OK, "{\"info\": 3}").into_response();
    }

    Json(json!({
        "info": {
            "count": 826,
            "pages": 42,
            "next": "https://rickandmortyapi.com/api/character?page=3",
            "prev": "https://rickandmortyapi.com/api/character?page=1"
        },
        "results": [character_json(2)]
    }))
    .into_response()
}

async fn get_character(Path(id): Path<i64>) -> AxumResponse {
    if id > 826 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Character not found" })),
        )
            .into_response();
    }
    Json(character_json(id)).into_response()
}

async fn spawn_catalog_server() -> Result<(String, CatalogServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = CatalogServerState::default();
    let app = Router::new()
        .route("/api/character", get(list_characters))
        .route("/api/character/:id", get(get_character))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

#[test]
fn collection_query_omits_absent_filters() {
    let filters = FilterSet::new()
        .with(FilterKey::Gender, "female")
        .with(FilterKey::Species, "");
    assert_eq!(
        collection_query(4, &filters),
        vec![("page", "4".to_string()), ("gender", "female".to_string())]
    );
}

#[test]
fn trailing_slash_is_trimmed_from_base_url() {
    let gateway = HttpCatalogGateway::new("https://rickandmortyapi.com/api/");
    assert_eq!(gateway.base_url(), "https://rickandmortyapi.com/api");
}

#[tokio::test]
async fn fetch_collection_sends_page_and_non_empty_filters() {
    let (base_url, state) = spawn_catalog_server().await.expect("spawn server");
    let gateway = HttpCatalogGateway::new(base_url);
    let filters = FilterSet::new()
        .with(FilterKey::Status, "alive")
        .with(FilterKey::Name, "morty");

    let page = gateway
        .fetch_collection(2, &filters)
        .await
        .expect("collection");

    assert_eq!(page.total_count, 826);
    assert_eq!(page.total_pages, 42);
    assert!(page.has_next && page.has_prev);
    assert_eq!(page.entities.len(), 1);
    assert_eq!(page.entities[0].status, EntityStatus::Alive);
    assert_eq!(
        *state.queries.lock().await,
        vec!["page=2&name=morty&status=alive".to_string()]
    );
}

#[tokio::test]
async fn no_matching_records_maps_to_not_found() {
    let (base_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let gateway = HttpCatalogGateway::new(base_url);

    let err = gateway
        .fetch_collection(1, &FilterSet::new().with(FilterKey::Name, "nobody"))
        .await
        .expect_err("should be not found");

    assert_eq!(err, CatalogError::not_found("There is nothing here"));
}

#[tokio::test]
async fn server_failure_maps_to_transport_error() {
    let (base_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let gateway = HttpCatalogGateway::new(base_url);

    let err = gateway
        .fetch_collection(1, &FilterSet::new().with(FilterKey::Name, "boom"))
        .await
        .expect_err("should fail");

    assert!(matches!(
        err,
        CatalogError::Transport {
            status_code: Some(500),
            ..
        }
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn undecodable_body_maps_to_transport_error() {
    let (base_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let gateway = HttpCatalogGateway::new(base_url);

    let err = gateway
        .fetch_collection(1, &FilterSet::new().with(FilterKey::Name, "garbage"))
        .await
        .expect_err("should fail");

    assert!(matches!(
        err,
        CatalogError::Transport {
            status_code: Some(200),
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_entity_by_id() {
    let (base_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let gateway = HttpCatalogGateway::new(base_url);

    let entity = gateway.fetch_entity(EntityId(2)).await.expect("entity");
    assert_eq!(entity.id, EntityId(2));
    assert_eq!(entity.location.id(), Some(EntityId(3)));

    let err = gateway
        .fetch_entity(EntityId(9999))
        .await
        .expect_err("should be not found");
    assert_eq!(err, CatalogError::not_found("Character not found"));
}

#[tokio::test]
async fn unreachable_server_maps_to_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let gateway = HttpCatalogGateway::new(format!("http://{addr}/api"));

    let err = gateway
        .fetch_entity(EntityId(1))
        .await
        .expect_err("should fail");

    assert!(matches!(
        err,
        CatalogError::Transport {
            status_code: None,
            ..
        }
    ));
}
