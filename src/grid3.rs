//! Blocking entry point over the GRID3 Nigeria catalog.
//!
//! [`Grid3`] owns one catalog (and therefore one cached service list), one
//! boundary resolver, and one preview sink. Every method runs on the calling
//! thread; see [`crate::async_grid3::AsyncGrid3`] for the non-blocking form.

use serde::Serialize;

use crate::boundary::{BoundaryResolver, StateBoundaries};
use crate::catalog::Catalog;
use crate::collection::FeatureCollectionResult;
use crate::config::ResolvedConfig;
use crate::domain::{FilterArgs, OutputFormat, ServiceSummary};
use crate::error::GeodataError;
use crate::http::{HttpGateway, ReqwestGateway};
use crate::metadata::{LayerMetadata, MetadataResolver};
use crate::preview::{GeoJsonPreview, PreviewHandle, PreviewSink};
use crate::query::QueryEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterOutput {
    Collection(FeatureCollectionResult),
    Preview(PreviewHandle),
}

impl FilterOutput {
    pub fn into_collection(self) -> Option<FeatureCollectionResult> {
        match self {
            FilterOutput::Collection(collection) => Some(collection),
            FilterOutput::Preview(_) => None,
        }
    }
}

pub type DefaultGrid3 = Grid3<ReqwestGateway, StateBoundaries<ReqwestGateway>, GeoJsonPreview>;

pub struct Grid3<G: HttpGateway, B: BoundaryResolver, P: PreviewSink> {
    catalog: Catalog<G>,
    boundaries: B,
    preview: P,
}

impl DefaultGrid3 {
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, GeodataError> {
        let gateway = ReqwestGateway::new(config.timeout)?;
        let boundaries = StateBoundaries::new(
            gateway.clone(),
            config.boundaries_url.clone(),
            config.boundary_name_field.clone(),
        );
        Ok(Grid3::new(
            Catalog::new(gateway, config.catalog_url.clone()),
            boundaries,
            GeoJsonPreview::new(config.preview_dir.clone()),
        ))
    }
}

impl<G: HttpGateway, B: BoundaryResolver, P: PreviewSink> Grid3<G, B, P> {
    pub fn new(catalog: Catalog<G>, boundaries: B, preview: P) -> Self {
        Self {
            catalog,
            boundaries,
            preview,
        }
    }

    pub fn catalog(&self) -> &Catalog<G> {
        &self.catalog
    }

    pub fn list_data(&self) -> Result<Vec<ServiceSummary>, GeodataError> {
        Ok(self.catalog.list_services()?.to_vec())
    }

    pub fn search(&self, query: &str) -> Result<Vec<ServiceSummary>, GeodataError> {
        self.catalog.search(query)
    }

    pub fn info(&self, name: &str) -> Result<LayerMetadata, GeodataError> {
        MetadataResolver::new(&self.catalog).resolve(name)
    }

    pub fn filter(
        &self,
        name: &str,
        args: FilterArgs,
        format: OutputFormat,
    ) -> Result<FilterOutput, GeodataError> {
        let collection = QueryEngine::new(&self.catalog, &self.boundaries).filter(name, args)?;
        match format {
            OutputFormat::Collection => Ok(FilterOutput::Collection(collection)),
            OutputFormat::Preview => Ok(FilterOutput::Preview(self.preview.render(&collection)?)),
        }
    }
}
