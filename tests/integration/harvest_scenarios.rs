//! Pagination driver behavior within a single harvesting window

use oai_harvest::{HarvestError, HarvestOptions};

use super::support::*;

/// Options pinned to a single monthly window, `2020-03-01 ..= 2020-03-09`.
fn single_window_options() -> HarvestOptions {
    let mut options = HarvestOptions::new("http://example.org/oai");
    options.from = Some("2020-03-01".to_string());
    options
}

const STARTED: &str = "2020-03-10T06:00:00Z";

#[tokio::test]
async fn token_chain_writes_pages_in_order() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        list_page(2, Some("cursor-1")),
        list_page(2, Some("cursor-2")),
        list_page(1, None),
    ]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].resumption_token, None);
    assert_eq!(requests[1].resumption_token.as_deref(), Some("cursor-1"));
    assert_eq!(requests[2].resumption_token.as_deref(), Some("cursor-2"));
    // the window boundaries ride along on every page of the conversation
    for request in &requests {
        assert_eq!(request.from.as_deref(), Some("2020-03-01"));
        assert_eq!(request.until.as_deref(), Some("2020-03-09"));
        assert_eq!(request.metadata_prefix.as_deref(), Some("oai_dc"));
    }

    assert_eq!(
        cached_names(harvester.dir()),
        vec![
            "2020-03-09-00000000.xml.gz",
            "2020-03-09-00000001.xml.gz",
            "2020-03-09-00000002.xml.gz",
        ]
    );
}

#[tokio::test]
async fn empty_streak_stops_cleanly_and_keeps_pages() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        list_page(0, Some("cursor-1")),
        list_page(0, Some("cursor-2")),
        list_page(0, Some("cursor-3")),
    ]);
    let mut options = single_window_options();
    options.max_empty_responses = 3;
    let mut harvester = harvester(
        base.path(),
        options,
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    assert_eq!(transport.requests().len(), 3);
    assert_eq!(transport.remaining(), 0);
    assert_eq!(
        cached_names(harvester.dir()),
        vec![
            "2020-03-09-00000000.xml.gz",
            "2020-03-09-00000001.xml.gz",
            "2020-03-09-00000002.xml.gz",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn internal_exception_retries_same_token_and_counts_the_attempt() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        list_page(1, Some("cursor-1")),
        fault_page("InternalException", None),
        list_page(1, None),
    ]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    // the retry replays the token of the failed attempt
    assert_eq!(requests[1].resumption_token.as_deref(), Some("cursor-1"));
    assert_eq!(requests[2].resumption_token.as_deref(), Some("cursor-1"));
    // the failed attempt consumed page index 1
    assert_eq!(
        cached_names(harvester.dir()),
        vec![
            "2020-03-09-00000000.xml.gz",
            "2020-03-09-00000002.xml.gz",
        ]
    );
}

#[tokio::test]
async fn no_records_match_with_token_continues() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        list_page(1, Some("cursor-1")),
        fault_page("noRecordsMatch", Some("cursor-2")),
        list_page(1, None),
    ]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].resumption_token.as_deref(), Some("cursor-2"));
    // the quirky error envelope is still a page of the batch
    assert_eq!(
        cached_names(harvester.dir()),
        vec![
            "2020-03-09-00000000.xml.gz",
            "2020-03-09-00000001.xml.gz",
            "2020-03-09-00000002.xml.gz",
        ]
    );
}

#[tokio::test]
async fn no_records_match_without_token_is_a_valid_empty_batch() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![fault_page("noRecordsMatch", None)]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    assert!(cached_names(harvester.dir()).is_empty());
    assert!(temp_names(harvester.dir()).is_empty());
}

#[tokio::test]
async fn ignored_transport_error_stops_early_and_promotes() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![list_page(1, Some("cursor-1"))]);
    let mut options = single_window_options();
    options.ignore_http_errors = true;
    let mut harvester = harvester(
        base.path(),
        options,
        day_identify("2020-01-15"),
        &transport,
    );

    // the second request hits the exhausted script and fails
    harvester.run_at(instant(STARTED)).await.unwrap();

    assert_eq!(
        cached_names(harvester.dir()),
        vec!["2020-03-09-00000000.xml.gz"]
    );
    assert!(temp_names(harvester.dir()).is_empty());
}

#[tokio::test]
async fn transport_error_discards_the_batch() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![list_page(1, Some("cursor-1"))]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    let result = harvester.run_at(instant(STARTED)).await;

    assert!(matches!(result, Err(HarvestError::Transport(_))));
    // the written page was never promoted and its temp file was swept
    assert!(cached_names(harvester.dir()).is_empty());
    assert!(temp_names(harvester.dir()).is_empty());
}

#[tokio::test]
async fn unhandled_protocol_error_propagates() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![fault_page("badArgument", None)]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    let result = harvester.run_at(instant(STARTED)).await;

    match result {
        Err(HarvestError::Protocol { code, .. }) => assert_eq!(code, "badArgument"),
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(cached_names(harvester.dir()).is_empty());
    assert!(temp_names(harvester.dir()).is_empty());
}

#[tokio::test]
async fn request_limit_bounds_the_window() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        list_page(2, Some("cursor-1")),
        list_page(2, Some("cursor-2")),
        list_page(2, Some("cursor-3")),
    ]);
    let mut options = single_window_options();
    options.max_requests = 2;
    let mut harvester = harvester(
        base.path(),
        options,
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(
        cached_names(harvester.dir()),
        vec![
            "2020-03-09-00000000.xml.gz",
            "2020-03-09-00000001.xml.gz",
        ]
    );
}

#[tokio::test]
async fn suppressed_format_parameter_reaches_the_wire() {
    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![list_page(1, None)]);
    let mut options = single_window_options();
    options.suppress_format_parameter = true;
    let mut harvester = harvester(
        base.path(),
        options,
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    let requests = transport.requests();
    let params = requests[0].query_params();
    assert!(!params.iter().any(|(key, _)| *key == "metadataPrefix"));
}

#[tokio::test]
async fn promoted_pages_round_trip_the_raw_envelope() {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let base = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![list_page(2, None)]);
    let mut harvester = harvester(
        base.path(),
        single_window_options(),
        day_identify("2020-01-15"),
        &transport,
    );

    harvester.run_at(instant(STARTED)).await.unwrap();

    let path = harvester.dir().join("2020-03-09-00000000.xml.gz");
    let mut decoder = GzDecoder::new(std::fs::File::open(path).unwrap());
    let mut body = String::new();
    decoder.read_to_string(&mut body).unwrap();
    assert!(body.starts_with("<OAI-PMH>"));
    assert!(body.contains("oai:test:1"));
}
