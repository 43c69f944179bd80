use super::*;

fn state(page: u32, pairs: &[(FilterKey, &str)]) -> ViewState {
    ViewState {
        current_page: page,
        filters: pairs.iter().map(|(k, v)| (*k, *v)).collect(),
    }
}

#[test]
fn empty_query_parses_to_first_page_without_filters() {
    assert_eq!(parse_query(""), ViewState::default());
    assert_eq!(parse_query("?"), ViewState::default());
    assert_eq!(parse_query("https://example.test/"), ViewState::default());
}

#[test]
fn unusable_page_values_fall_back_to_one() {
    for raw in ["?page=abc", "?page=0", "?page=-4", "?page=", "?page=2.5"] {
        assert_eq!(parse_query(raw).current_page, 1, "{raw}");
    }
    assert_eq!(parse_query("?page=7").current_page, 7);
}

#[test]
fn parses_filters_from_bare_query_or_full_url() {
    let expected = state(3, &[(FilterKey::Status, "alive"), (FilterKey::Name, "rick sanchez")]);
    assert_eq!(parse_query("page=3&status=alive&name=rick+sanchez"), expected);
    assert_eq!(
        parse_query("http://localhost:8080/?status=alive&page=3&name=rick%20sanchez#top"),
        expected
    );
}

#[test]
fn empty_and_unknown_params_are_ignored() {
    let parsed = parse_query("?page=2&species=&gender=female&sort=name");
    assert_eq!(parsed, state(2, &[(FilterKey::Gender, "female")]));
}

#[test]
fn filter_values_with_control_characters_parse_as_absent() {
    assert_eq!(
        parse_query("?name=rick%0Asanchez&status=alive&species=%09"),
        state(1, &[(FilterKey::Status, "alive")])
    );
    assert!(is_acceptable_filter_value("rick sanchez"));
    assert!(!is_acceptable_filter_value("rick\u{7}"));
}

#[test]
fn first_occurrence_of_repeated_param_wins() {
    let parsed = parse_query("?status=dead&status=alive&page=4&page=9");
    assert_eq!(parsed, state(4, &[(FilterKey::Status, "dead")]));
}

#[test]
fn committed_filters_serialize_without_empty_pairs() {
    let mut filters = FilterSet::new().with(FilterKey::Status, "alive");
    filters.set(FilterKey::Species, Some(String::new()));
    let view = ViewState {
        current_page: 1,
        filters,
    };
    assert_eq!(to_query(&view), "?page=1&status=alive");
    assert_eq!(to_query(&ViewState::default()), "?page=1");
}

#[test]
fn every_filter_subset_round_trips() {
    let values = [
        (FilterKey::Name, "Rick & Morty"),
        (FilterKey::Status, "unknown"),
        (FilterKey::Species, "Mythological Creature"),
        (FilterKey::Gender, "genderless"),
    ];
    for mask in 0u8..16 {
        for page in [1, 2, 42] {
            let pairs: Vec<_> = values
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, pair)| *pair)
                .collect();
            let original = state(page, &pairs);
            let reparsed = parse_query(&to_query(&original));
            assert_eq!(reparsed, original, "mask {mask} page {page}");
        }
    }
}

#[test]
fn rewrite_keeps_foreign_params_and_replaces_owned_ones() {
    let view = state(1, &[(FilterKey::Gender, "male")]);
    let rewritten = rewrite_query("?utm_source=mail&page=5&status=dead&tab=grid", &view);
    assert_eq!(rewritten, "?page=1&gender=male&utm_source=mail&tab=grid");
    assert_eq!(parse_query(&rewritten), view);
}

#[test]
fn memory_address_bar_tracks_history() {
    let bar = MemoryAddressBar::new("?page=2");
    assert_eq!(bar.read_query(), "?page=2");
    bar.push_query("?page=3");
    assert_eq!(bar.history(), vec!["?page=2".to_string(), "?page=3".to_string()]);
    assert_eq!(bar.back(), Some("?page=2".to_string()));
    assert_eq!(bar.back(), None);
    assert_eq!(bar.current(), "?page=2");
}
