mod common;

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::Value;

use nigeria_geodata::async_grid3::{AsyncGrid3, WorkerRuntime};
use nigeria_geodata::catalog::Catalog;
use nigeria_geodata::domain::{FilterArgs, OutputFormat};
use nigeria_geodata::error::GeodataError;
use nigeria_geodata::grid3::{FilterOutput, Grid3};
use nigeria_geodata::http::RequestMethod;
use nigeria_geodata::preview::GeoJsonPreview;

use common::{
    CATALOG_URL, FixedBoundaries, MockGateway, RecordingPreview, catalog_body, page, query_url,
    script_dataset,
};

const DATASET: &str = "NGA_HealthFacilities_v1_72";

fn scripted_gateway() -> MockGateway {
    let gateway = MockGateway::new();
    gateway.on(
        RequestMethod::Get,
        CATALOG_URL,
        catalog_body(&[DATASET, "NGA_Schools", "Nigeria_Health_Workforce"]),
    );
    script_dataset(&gateway, DATASET, 2, 1000, 4326);
    gateway.on(RequestMethod::Post, &query_url(DATASET), page(0, 2));
    gateway
}

fn grid3() -> Grid3<MockGateway, FixedBoundaries, RecordingPreview> {
    Grid3::new(
        Catalog::new(scripted_gateway(), CATALOG_URL),
        FixedBoundaries::default(),
        RecordingPreview::default(),
    )
}

#[test]
fn list_and_search_share_one_catalog_fetch() {
    let grid3 = grid3();
    assert_eq!(grid3.list_data().unwrap().len(), 3);
    let health = grid3.search("HEALTH").unwrap();
    assert_eq!(health.len(), 2);
    assert_eq!(
        grid3
            .catalog()
            .gateway()
            .calls_to(RequestMethod::Get, CATALOG_URL)
            .len(),
        1
    );
}

#[test]
fn info_returns_layer_metadata() {
    let metadata = grid3().info(DATASET).unwrap();
    assert_eq!(metadata.total_feature_count, 2);
    assert_eq!(metadata.object_id_field, "FID");
}

#[test]
fn collection_format_returns_features() {
    let grid3 = grid3();
    let output = grid3
        .filter(DATASET, FilterArgs::region("Lagos"), OutputFormat::Collection)
        .unwrap();
    let collection = output.into_collection().unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.crs, "EPSG:4326");
}

#[test]
fn preview_format_hands_collection_to_sink() {
    let grid3 = grid3();
    let output = grid3
        .filter(DATASET, FilterArgs::region("Lagos"), OutputFormat::Preview)
        .unwrap();
    assert_matches!(output, FilterOutput::Preview(handle) if handle.feature_count == 2);
}

#[test]
fn geojson_preview_writes_file() {
    let temp = tempfile::tempdir().unwrap();
    let preview_dir = Utf8PathBuf::from_path_buf(temp.path().join("previews")).unwrap();
    let grid3 = Grid3::new(
        Catalog::new(scripted_gateway(), CATALOG_URL),
        FixedBoundaries::default(),
        GeoJsonPreview::new(preview_dir.clone()),
    );

    let output = grid3
        .filter(
            DATASET,
            FilterArgs::bbox(vec![2.7, 6.3, 4.4, 6.8]),
            OutputFormat::Preview,
        )
        .unwrap();
    let FilterOutput::Preview(handle) = output else {
        panic!("expected a preview handle");
    };
    assert!(handle.path.starts_with(&preview_dir));

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(handle.path.as_std_path()).unwrap())
            .unwrap();
    assert_eq!(written["features"].as_array().unwrap().len(), 2);
    assert_eq!(written["crs"]["properties"]["name"], "EPSG:4326");
}

#[test]
fn filter_on_unknown_dataset_fails_before_querying() {
    let grid3 = grid3();
    let err = grid3
        .filter(
            "NGA_Unknown",
            FilterArgs::region("Lagos"),
            OutputFormat::Collection,
        )
        .unwrap_err();
    assert_matches!(err, GeodataError::DatasetNotFound(_));
    assert!(
        grid3
            .catalog()
            .gateway()
            .calls_to(RequestMethod::Post, &query_url(DATASET))
            .is_empty()
    );
}

#[tokio::test]
async fn async_adapter_matches_blocking_results() {
    let shared = Arc::new(grid3());
    let async_grid3 = AsyncGrid3::from_shared(Arc::clone(&shared));

    let services = async_grid3.list_data().await.unwrap();
    assert_eq!(services, shared.list_data().unwrap());

    let found = async_grid3.search("schools").await.unwrap();
    assert_eq!(found.len(), 1);

    let metadata = async_grid3.info(DATASET).await.unwrap();
    assert_eq!(metadata.crs(), "EPSG:4326");

    let output = async_grid3
        .filter(DATASET, FilterArgs::region("Lagos"), OutputFormat::Collection)
        .await
        .unwrap();
    assert_eq!(output.into_collection().unwrap().len(), 2);
}

#[tokio::test]
async fn async_adapter_propagates_errors() {
    let async_grid3 = AsyncGrid3::new(grid3());
    let err = async_grid3
        .filter(DATASET, FilterArgs::default(), OutputFormat::Collection)
        .await
        .unwrap_err();
    assert_matches!(err, GeodataError::InvalidFilterArgument(_));
}

#[test]
fn dropping_worker_runtime_does_not_wait_for_blocking_work() {
    let runtime = WorkerRuntime::new().unwrap();
    let handle = runtime.handle();
    let (started_tx, started_rx) = mpsc::channel();
    thread::spawn(move || {
        let work = handle.spawn_blocking(move || {
            started_tx.send(()).ok();
            thread::sleep(Duration::from_secs(3));
        });
        let _ = handle.block_on(work);
    });
    started_rx.recv().unwrap();

    let dropped = Instant::now();
    drop(runtime);
    assert!(dropped.elapsed() < Duration::from_secs(1));
}
