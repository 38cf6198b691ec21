//! Spatially filtered, paginated feature queries against an Esri FeatureServer layer.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::boundary::BoundaryResolver;
use crate::catalog::Catalog;
use crate::collection::{Feature, FeatureCollectionResult};
use crate::domain::{EsriGeometryType, FilterArgs, SpatialFilter};
use crate::error::GeodataError;
use crate::geometry::{geojson_to_esri_json, geojson_type_to_esri_type, validate_geometry};
use crate::http::{HttpGateway, QueryParams, RequestMethod, check_esri_error};
use crate::metadata::{LayerMetadata, MetadataResolver};

const SPATIAL_REL_INTERSECTS: &str = "esriSpatialRelIntersects";

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGeometry {
    pub geometry_type: EsriGeometryType,
    pub geometry: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EsriQueryParams {
    pub where_clause: String,
    pub geometry_type: EsriGeometryType,
    pub geometry: String,
    pub out_fields: String,
    pub spatial_rel: String,
    pub result_offset: u64,
    pub format: String,
}

impl EsriQueryParams {
    pub fn new(object_id_field: &str, encoded: EncodedGeometry) -> Self {
        Self {
            where_clause: format!("{object_id_field} > 0"),
            geometry_type: encoded.geometry_type,
            geometry: encoded.geometry,
            out_fields: "*".to_string(),
            spatial_rel: SPATIAL_REL_INTERSECTS.to_string(),
            result_offset: 0,
            format: "geojson".to_string(),
        }
    }

    pub fn to_params(&self) -> QueryParams {
        vec![
            ("where", self.where_clause.clone()),
            ("geometryType", self.geometry_type.to_string()),
            ("geometry", self.geometry.clone()),
            ("outFields", self.out_fields.clone()),
            ("spatialRel", self.spatial_rel.clone()),
            ("resultOffset", self.result_offset.to_string()),
            ("f", self.format.clone()),
        ]
    }
}

pub fn encode_filter<B: BoundaryResolver + ?Sized>(
    filter: &SpatialFilter,
    boundaries: &B,
) -> Result<EncodedGeometry, GeodataError> {
    match filter {
        SpatialFilter::RegionName(name) => {
            let geometry = boundaries.geometry_for_region(name)?;
            Ok(EncodedGeometry {
                geometry_type: EsriGeometryType::Polygon,
                geometry: geojson_to_esri_json(&geometry)?.to_string(),
            })
        }
        SpatialFilter::BoundingBox(bbox) => Ok(EncodedGeometry {
            geometry_type: EsriGeometryType::Envelope,
            geometry: bbox.to_envelope(),
        }),
        SpatialFilter::AoiGeometry(value) => {
            let geometry = unwrap_feature(value);
            if !validate_geometry(geometry) {
                return Err(GeodataError::InvalidGeometry(
                    "the provided aoi geometry is not a well-formed GeoJSON geometry".to_string(),
                ));
            }
            let kind = geometry
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(EncodedGeometry {
                geometry_type: geojson_type_to_esri_type(kind)?,
                geometry: geojson_to_esri_json(geometry)?.to_string(),
            })
        }
    }
}

fn unwrap_feature(value: &Value) -> &Value {
    match value.get("type").and_then(Value::as_str) {
        Some("Feature") => value.get("geometry").unwrap_or(value),
        _ => value,
    }
}

pub struct QueryEngine<'a, G: HttpGateway, B: BoundaryResolver + ?Sized> {
    catalog: &'a Catalog<G>,
    boundaries: &'a B,
}

impl<'a, G: HttpGateway, B: BoundaryResolver + ?Sized> QueryEngine<'a, G, B> {
    pub fn new(catalog: &'a Catalog<G>, boundaries: &'a B) -> Self {
        Self {
            catalog,
            boundaries,
        }
    }

    pub fn filter(
        &self,
        dataset: &str,
        args: FilterArgs,
    ) -> Result<FeatureCollectionResult, GeodataError> {
        let metadata = MetadataResolver::new(self.catalog).resolve(dataset)?;
        self.filter_layer(&metadata, args)
    }

    pub fn filter_layer(
        &self,
        metadata: &LayerMetadata,
        args: FilterArgs,
    ) -> Result<FeatureCollectionResult, GeodataError> {
        let filter = args.into_filter()?;
        let encoded = encode_filter(&filter, self.boundaries)?;
        let wkid = metadata.spatial_reference.wkid;

        if metadata.total_feature_count == 0 {
            info!(layer = %metadata.layer_name, "layer is empty; skipping query");
            return Ok(FeatureCollectionResult::empty(wkid));
        }

        let params = EsriQueryParams::new(&metadata.object_id_field, encoded);
        let features = paginate(
            self.catalog.gateway(),
            &metadata.layer_query_url(),
            params,
            metadata.max_page_size,
            metadata.page_count(),
        )?;
        info!(
            layer = %metadata.layer_name,
            features = features.len(),
            "filter complete"
        );
        Ok(FeatureCollectionResult::assemble(features, wkid))
    }
}

pub fn paginate<G: HttpGateway + ?Sized>(
    gateway: &G,
    query_url: &str,
    mut params: EsriQueryParams,
    page_size: u64,
    max_rounds: u64,
) -> Result<Vec<Feature>, GeodataError> {
    let mut features = Vec::new();
    for round in 0..max_rounds {
        let response = check_esri_error(gateway.request(
            query_url,
            &params.to_params(),
            RequestMethod::Post,
        )?)?;
        let page = response
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GeodataError::UpstreamError("query response has no 'features' list".to_string())
            })?;
        let returned = page.len() as u64;
        debug!(round, offset = params.result_offset, returned, "received page");
        for feature in page {
            features.push(Feature::from_geojson(feature)?);
        }

        if returned < page_size {
            if response
                .get("exceededTransferLimit")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                warn!(
                    returned,
                    page_size, "server flagged a short page as exceeding its transfer limit"
                );
            }
            break;
        }
        params.result_offset += page_size;
    }
    Ok(features)
}
