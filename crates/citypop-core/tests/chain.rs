mod common;

use citypop_core::error::ProviderFailure;
use citypop_core::{CityError, FallbackChain, SourceCause};
use common::{calls, row, CannedHttp, FakeAdapter};

#[test]
fn stops_at_first_successful_source() {
    let a = FakeAdapter::failing("A", SourceCause::Network("timed out".into()));
    let b = FakeAdapter::rows("B", vec![row("Tokyo", "Japan", "37,400,068")]);
    let c = FakeAdapter::rows("C", vec![row("Delhi", "India", "31,000,000")]);
    let (a_calls, _) = a.handles();
    let (b_calls, _) = b.handles();
    let (c_calls, _) = c.handles();

    let chain = FallbackChain::new(vec![a.boxed(), b.boxed(), c.boxed()]);
    let res = chain.resolve(&CannedHttp::new()).unwrap();

    assert_eq!(res.source, "B");
    assert_eq!(res.records.len(), 1);
    assert_eq!(res.records[0].source, "B");
    assert_eq!(res.failures.len(), 1);
    assert_eq!(res.failures.0[0].provider(), "A");
    assert_eq!((calls(&a_calls), calls(&b_calls), calls(&c_calls)), (1, 1, 0));
}

#[test]
fn source_with_only_unusable_rows_counts_as_failure() {
    let a = FakeAdapter::rows("A", vec![row("", "Japan", "1"), row("X", "Y", "1.2M")]);
    let b = FakeAdapter::rows("B", vec![row("Lagos", "Nigeria", "15,300,000")]);
    let chain = FallbackChain::new(vec![a.boxed(), b.boxed()]);

    let res = chain.resolve(&CannedHttp::new()).unwrap();
    assert_eq!(res.source, "B");
    assert_eq!(
        res.failures.0[0],
        ProviderFailure::NoUsableRows {
            provider: "A".into(),
            skipped: 2
        }
    );
}

#[test]
fn all_failures_are_reported_in_chain_order() {
    let chain = FallbackChain::new(vec![
        FakeAdapter::failing("A", SourceCause::HttpStatus(503)).boxed(),
        FakeAdapter::failing("B", SourceCause::Format("not json".into())).boxed(),
        FakeAdapter::rows("C", vec![]).boxed(),
    ]);
    let err = chain.resolve(&CannedHttp::new()).unwrap_err();
    let CityError::AllSourcesUnavailable(log) = err else {
        panic!("unexpected error: {err}");
    };
    let providers: Vec<&str> = log.iter().map(|f| f.provider()).collect();
    assert_eq!(providers, ["A", "B", "C"]);
    assert!(log.to_string().contains("HTTP status 503"));
}

#[test]
fn duplicates_within_a_source_are_merged() {
    let mut with_coords = row("Tokyo", "Japan", "37000000");
    with_coords.insert("latitude", "35.68");
    with_coords.insert("longitude", "139.69");
    let chain = FallbackChain::new(vec![FakeAdapter::rows(
        "A",
        vec![row("Tokyo", "Japan", "37400068"), with_coords, row("Tōkyō", "JAPAN", "1")],
    )
    .boxed()]);

    let res = chain.resolve(&CannedHttp::new()).unwrap();
    assert_eq!(res.records.len(), 1);
    let tokyo = &res.records[0];
    assert_eq!(tokyo.population, 37_400_068);
    assert_eq!(tokyo.latitude, Some(35.68));
    assert_eq!(res.stats.merged_away, 2);
    assert_eq!(res.stats.records, 1);
}

#[test]
fn name_collapse_can_be_disabled() {
    let rows = vec![row("Tokyo", "Japan", "10"), row("Tōkyō", "Japan", "20")];
    let chain = FallbackChain::new(vec![FakeAdapter::rows("A", rows).boxed()])
        .with_name_collapse(false);
    assert_eq!(chain.resolve(&CannedHttp::new()).unwrap().records.len(), 2);
}

#[test]
fn same_named_cities_with_native_ids_survive_default_collapse() {
    let mut oregon = row("Portland", "US", "652503");
    oregon.insert("id", "5746545");
    let mut maine = row("Portland", "US", "68408");
    maine.insert("id", "4975802");
    let chain = FallbackChain::new(vec![FakeAdapter::rows("GeoNames", vec![oregon, maine]).boxed()]);

    let res = chain.resolve(&CannedHttp::new()).unwrap();
    assert_eq!(res.records.len(), 2);
    assert_eq!(res.stats.merged_away, 0);
}

#[test]
fn augment_sources_only_run_in_merge_mode() {
    let primary = || FakeAdapter::rows("api", vec![row("Cairo", "Egypt", "21,750,000")]);
    let mut coords = row("Cairo", "Egypt", "9,500,000");
    coords.insert("latitude", "30.04");
    coords.insert("longitude", "31.24");

    let extra = FakeAdapter::rows("dump", vec![coords.clone()]).augment();
    let (extra_calls, _) = extra.handles();
    let plain = FallbackChain::new(vec![primary().boxed(), extra.boxed()]);
    let res = plain.resolve(&CannedHttp::new()).unwrap();
    assert_eq!(calls(&extra_calls), 0);
    assert!(res.augmented_by.is_empty());

    let merged = FallbackChain::new(vec![
        primary().boxed(),
        FakeAdapter::rows("dump", vec![coords]).augment().boxed(),
    ])
    .with_merge_mode(true);
    let res = merged.resolve(&CannedHttp::new()).unwrap();
    let cairo = &res.records[0];
    assert_eq!(cairo.population, 21_750_000);
    assert_eq!(cairo.latitude, Some(30.04));
    assert_eq!(cairo.source, "api+dump");
    assert_eq!(res.augmented_by, ["dump"]);
}

#[test]
fn augment_failure_does_not_fail_resolution() {
    let chain = FallbackChain::new(vec![
        FakeAdapter::rows("api", vec![row("Cairo", "Egypt", "21750000")]).boxed(),
        FakeAdapter::failing("dump", SourceCause::Network("reset".into()))
            .augment()
            .boxed(),
    ])
    .with_merge_mode(true);
    let res = chain.resolve(&CannedHttp::new()).unwrap();
    assert_eq!(res.source, "api");
    assert_eq!(res.failures.len(), 1);
    assert!(res.augmented_by.is_empty());
}

#[test]
fn augment_only_chain_has_no_primary() {
    let chain = FallbackChain::new(vec![FakeAdapter::rows("dump", vec![row("A", "B", "1")])
        .augment()
        .boxed()])
    .with_merge_mode(true);
    let err = chain.resolve(&CannedHttp::new()).unwrap_err();
    assert!(matches!(err, CityError::AllSourcesUnavailable(log) if log.is_empty()));
}
