mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use citypop_core::{snapshot, CityService, Dataset, FallbackChain, QueryParams, RefreshStats};
use citypop_core::{ServiceOptions, SourceCause};
use common::{record, CannedHttp, FakeAdapter};
use std::sync::Arc;

fn sample() -> Dataset {
    let mut tokyo = record("Tokyo", "Japan", 37_400_068);
    tokyo.latitude = Some(35.6897);
    tokyo.longitude = Some(139.6922);
    tokyo.as_of = Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    Dataset {
        records: vec![tokyo, record("São Paulo", "Brazil", 22_430_000)],
        source: "WorldPopulationReview".into(),
        augmented_by: vec!["GeoNames".into()],
        refreshed_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        stats: RefreshStats {
            rows_fetched: 3,
            skipped_invalid_population: 1,
            records: 2,
            ..RefreshStats::default()
        },
    }
}

#[test]
fn snapshot_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.bin.gz");
    let original = sample();

    snapshot::save(&original, &path).unwrap();
    let loaded = snapshot::load(&path).unwrap();

    assert_eq!(loaded.records, original.records);
    assert_eq!(loaded.refreshed_at, original.refreshed_at);
    assert_eq!(loaded.source_label(), "WorldPopulationReview+GeoNames");
    assert_eq!(loaded.stats, original.stats);
}

#[test]
fn missing_snapshot_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = snapshot::load(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, citypop_core::CityError::Io(_)));
}

#[test]
fn old_snapshot_serves_as_stale_data_when_offline() {
    let mut dataset = sample();
    dataset.refreshed_at = Utc::now() - ChronoDuration::days(2);
    let seeded_at = dataset.refreshed_at;

    let service = CityService::new(
        FallbackChain::new(vec![
            FakeAdapter::failing("api", SourceCause::Network("offline".into())).boxed(),
        ]),
        Arc::new(CannedHttp::new()),
        ServiceOptions::default(),
    );
    service.seed(dataset);

    let view = service.get_view(&QueryParams::new()).unwrap();
    assert!(view.stale);
    assert_eq!(view.refreshed_at, seeded_at);
    assert_eq!(view.rows.len(), 2);
}

#[test]
fn fresh_snapshot_avoids_fetching() {
    let mut dataset = sample();
    dataset.refreshed_at = Utc::now();
    let api = FakeAdapter::failing("api", SourceCause::Network("offline".into()));
    let (api_calls, _) = api.handles();
    let service = CityService::new(
        FallbackChain::new(vec![api.boxed()]),
        Arc::new(CannedHttp::new()),
        ServiceOptions::default(),
    );
    service.seed(dataset);

    let view = service.get_view(&QueryParams::new().search("sao")).unwrap();
    assert!(!view.stale);
    assert_eq!(view.rows[0].record.city, "São Paulo");
    assert_eq!(common::calls(&api_calls), 0);
}
