use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::Serialize;
use tempfile::Builder;
use tracing::info;

use crate::collection::FeatureCollectionResult;
use crate::error::GeodataError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewHandle {
    pub path: Utf8PathBuf,
    pub feature_count: usize,
    pub crs: String,
}

pub trait PreviewSink: Send + Sync {
    fn render(&self, collection: &FeatureCollectionResult) -> Result<PreviewHandle, GeodataError>;
}

impl<T: PreviewSink + ?Sized> PreviewSink for std::sync::Arc<T> {
    fn render(&self, collection: &FeatureCollectionResult) -> Result<PreviewHandle, GeodataError> {
        (**self).render(collection)
    }
}

#[derive(Debug, Clone)]
pub struct GeoJsonPreview {
    dir: Utf8PathBuf,
}

impl GeoJsonPreview {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn next_path(&self) -> Utf8PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.dir.join(format!("preview-{stamp}.geojson"))
    }
}

impl PreviewSink for GeoJsonPreview {
    fn render(&self, collection: &FeatureCollectionResult) -> Result<PreviewHandle, GeodataError> {
        let path = self.next_path();
        write_geojson(&path, collection)?;
        info!(path = %path, features = collection.len(), "wrote preview");
        Ok(PreviewHandle {
            path,
            feature_count: collection.len(),
            crs: collection.crs.clone(),
        })
    }
}

pub fn write_geojson(
    path: &Utf8Path,
    collection: &FeatureCollectionResult,
) -> Result<(), GeodataError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GeodataError::Filesystem(format!("create {parent}: {err}")))?;

    let content = serde_json::to_vec_pretty(&collection.to_geojson())
        .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix("ngeo-preview")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GeodataError::Filesystem(format!("write {path}: {}", err.error)))?;
    Ok(())
}
