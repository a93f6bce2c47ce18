// Integration tests for the NPI resolver against a mock registry server

use mockito::Matcher;

use npi_resolver::batch::{run_batch, status, BatchOptions};
use npi_resolver::core::resolver::{InvalidOptions, ResolveError, Resolver, ResolverOptions};
use npi_resolver::models::ProviderRecord;
use npi_resolver::services::registry::NpiRegistryClient;
use npi_resolver::services::store::{RosterRow, RosterStore};

fn record() -> ProviderRecord {
    ProviderRecord {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        city: "Springfield".to_string(),
        postal_code: "62701".to_string(),
        state: "IL".to_string(),
        specialty_code: "207RE0101X".to_string(),
    }
}

fn client_for(server: &mockito::ServerGuard) -> NpiRegistryClient {
    NpiRegistryClient::new(server.url(), "2.1".to_string(), 5, 1).unwrap()
}

fn name_query(extra: Vec<Matcher>) -> Matcher {
    let mut matchers = vec![
        Matcher::UrlEncoded("first_name".into(), "Jane".into()),
        Matcher::UrlEncoded("last_name".into(), "Doe".into()),
        Matcher::UrlEncoded("enumeration_type".into(), "NPI-1".into()),
        Matcher::UrlEncoded("country_code".into(), "US".into()),
    ];
    matchers.extend(extra);
    Matcher::AllOf(matchers)
}

#[tokio::test]
async fn test_unique_name_match_resolves_first_iteration() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_query(name_query(vec![]))
        .with_status(200)
        .with_body(r#"{"result_count":1,"results":[{"number":1234567890}]}"#)
        .expect(1)
        .create_async()
        .await;

    // Only names populated: the start rung is effectively name-only.
    let mut rec = record();
    rec.city.clear();
    rec.postal_code.clear();
    rec.state.clear();
    rec.specialty_code.clear();

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let npi = resolver.resolve(&rec, &client).await.unwrap();

    assert_eq!(npi, "1234567890");
    // A unique match on page one means exactly one page fetch.
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ambiguous_then_narrowed_to_unique() {
    let mut server = mockito::Server::new_async().await;

    // Start rung (specialty + names): two matches. Mocks are matched newest
    // first, so the broader matcher is registered before the narrower one.
    let broad = server
        .mock("GET", "/")
        .match_query(name_query(vec![Matcher::UrlEncoded(
            "specialty_code".into(),
            "207RE0101X".into(),
        )]))
        .with_status(200)
        .with_body(
            r#"{"result_count":2,"results":[{"number":1111111111},{"number":2222222222}]}"#,
        )
        .create_async()
        .await;

    // One rung down adds the state filter: unique.
    let narrow = server
        .mock("GET", "/")
        .match_query(name_query(vec![
            Matcher::UrlEncoded("specialty_code".into(), "207RE0101X".into()),
            Matcher::UrlEncoded("state".into(), "IL".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result_count":1,"results":[{"number":1234567890}]}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let npi = resolver.resolve(&record(), &client).await.unwrap();

    assert_eq!(npi, "1234567890");
    broad.assert_async().await;
    narrow.assert_async().await;
}

#[tokio::test]
async fn test_oscillation_between_two_rungs() {
    let mut server = mockito::Server::new_async().await;

    // Start rung: two matches -> narrow. Narrowed rung (adds state): zero
    // matches -> relax back to the start rung, which is already visited.
    let broad = server
        .mock("GET", "/")
        .match_query(name_query(vec![Matcher::UrlEncoded(
            "specialty_code".into(),
            "207RE0101X".into(),
        )]))
        .with_status(200)
        .with_body(
            r#"{"result_count":2,"results":[{"number":1111111111},{"number":2222222222}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let narrow = server
        .mock("GET", "/")
        .match_query(name_query(vec![
            Matcher::UrlEncoded("specialty_code".into(), "207RE0101X".into()),
            Matcher::UrlEncoded("state".into(), "IL".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result_count":0,"results":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let err = resolver.resolve(&record(), &client).await.unwrap_err();

    assert!(matches!(err, ResolveError::Oscillation));
    broad.assert_async().await;
    narrow.assert_async().await;
}

#[tokio::test]
async fn test_no_provider_by_that_name_exhausts() {
    let mut server = mockito::Server::new_async().await;
    // Name-only record: rungs 3 and 4 issue the same name-only query, then
    // the index walks off the permissive end of the ladder.
    let mock = server
        .mock("GET", "/")
        .match_query(name_query(vec![]))
        .with_status(200)
        .with_body(r#"{"result_count":0,"results":[]}"#)
        .expect(2)
        .create_async()
        .await;

    let mut rec = record();
    rec.city.clear();
    rec.postal_code.clear();
    rec.state.clear();
    rec.specialty_code.clear();

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let err = resolver.resolve(&rec, &client).await.unwrap_err();

    assert!(matches!(err, ResolveError::ExhaustedSearchSpace));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_validation_error_treated_as_ambiguous() {
    let mut server = mockito::Server::new_async().await;

    // Registry rejects the start-rung combination; the resolver biases
    // toward narrowing instead of treating it as an empty result.
    let rejected = server
        .mock("GET", "/")
        .match_query(name_query(vec![Matcher::UrlEncoded(
            "specialty_code".into(),
            "207RE0101X".into(),
        )]))
        .with_status(200)
        .with_body(r#"{"Errors":[{"description":"Invalid Field Name","field":"specialty_code"}]}"#)
        .create_async()
        .await;

    let narrow = server
        .mock("GET", "/")
        .match_query(name_query(vec![
            Matcher::UrlEncoded("specialty_code".into(), "207RE0101X".into()),
            Matcher::UrlEncoded("state".into(), "IL".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result_count":1,"results":[{"number":1234567890}]}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let npi = resolver.resolve(&record(), &client).await.unwrap();

    assert_eq!(npi, "1234567890");
    rejected.assert_async().await;
    narrow.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_upstream() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let client = client_for(&server);
    let resolver = Resolver::with_default_options();
    let err = resolver.resolve(&record(), &client).await.unwrap_err();

    assert!(matches!(err, ResolveError::Upstream(_)));
}

#[test]
fn test_option_bounds_rejected_before_any_network_call() {
    let mut options = ResolverOptions::default();
    options.page_size = 9;
    assert!(matches!(
        Resolver::new(options.clone()),
        Err(InvalidOptions::PageSize(9))
    ));

    options.page_size = 201;
    assert!(matches!(
        Resolver::new(options.clone()),
        Err(InvalidOptions::PageSize(201))
    ));

    options.page_size = 100;
    options.stop_after = 1300;
    assert!(matches!(
        Resolver::new(options),
        Err(InvalidOptions::StopAfter(1300))
    ));
}

#[tokio::test]
async fn test_batch_end_to_end_skips_and_resolves() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("first_name".into(), "Rick".into()),
            Matcher::UrlEncoded("last_name".into(), "Roe".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result_count":1,"results":[{"number":"5556667778"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let already_resolved = RosterRow {
        record: ProviderRecord {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            city: String::new(),
            postal_code: String::new(),
            state: String::new(),
            specialty_code: String::new(),
        },
        specialty: String::new(),
        npi: "1234567890".to_string(),
        npi_status: status::OK.to_string(),
    };
    let pending = RosterRow {
        record: ProviderRecord {
            first_name: "Rick".to_string(),
            last_name: "Roe".to_string(),
            city: String::new(),
            postal_code: String::new(),
            state: String::new(),
            specialty_code: String::new(),
        },
        specialty: String::new(),
        npi: String::new(),
        npi_status: String::new(),
    };

    let dir = tempfile::tempdir().unwrap();
    let store = RosterStore::new(dir.path().join("out.csv"));
    let client = client_for(&server);
    let resolver = Resolver::with_default_options();

    let mut rows = vec![already_resolved, pending];
    let summary = run_batch(&mut rows, &resolver, &client, &store, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.resolved, 1);
    assert_eq!(rows[0].npi, "1234567890"); // untouched
    assert_eq!(rows[1].npi, "5556667778");
    // Exactly one registry query: the resolved row was never re-queried.
    mock.assert_async().await;

    // The settled roster is on disk and a re-run skips everything.
    let mut reloaded = RosterStore::load(store.path()).unwrap();
    let summary = run_batch(
        &mut reloaded,
        &resolver,
        &client,
        &store,
        &BatchOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.resolved, 0);
}
