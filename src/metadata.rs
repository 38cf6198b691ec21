use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::GeodataError;
use crate::http::{HttpGateway, RequestMethod, check_esri_error};

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    pub wkid: i64,
    #[serde(default)]
    pub latest_wkid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub geometry_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetadata {
    pub layer_name: String,
    pub layer_geometry_type: String,
    pub object_id_field: String,
    pub layer_id: i64,
    pub last_updated: Option<DateTime<Utc>>,
    pub total_feature_count: u64,
    pub max_page_size: u64,
    pub service_item_id: String,
    pub service_description: String,
    pub supported_query_formats: String,
    pub supported_export_formats: String,
    pub capabilities: String,
    pub description: String,
    pub copyright_text: String,
    pub spatial_reference: SpatialReference,
    pub full_extent: Option<Extent>,
    pub layers: Vec<LayerSummary>,
    pub tables: Vec<Value>,
    pub fields: Vec<FieldInfo>,
    pub feature_server_url: String,
}

impl LayerMetadata {
    pub fn layer_query_url(&self) -> String {
        format!("{}/{}/query", self.feature_server_url, self.layer_id)
    }

    pub fn crs(&self) -> String {
        format!("EPSG:{}", self.spatial_reference.wkid)
    }

    pub fn page_count(&self) -> u64 {
        if self.max_page_size == 0 {
            return 0;
        }
        self.total_feature_count.div_ceil(self.max_page_size)
    }

    pub fn plain_description(&self) -> String {
        strip_html(&self.description)
    }
}

pub struct MetadataResolver<'a, G: HttpGateway> {
    catalog: &'a Catalog<G>,
}

impl<'a, G: HttpGateway> MetadataResolver<'a, G> {
    pub fn new(catalog: &'a Catalog<G>) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, name: &str) -> Result<LayerMetadata, GeodataError> {
        let service = self.catalog.find_exact(name)?;
        let gateway = self.catalog.gateway();
        let json_format = [("f", "json".to_string())];

        let descriptor = check_esri_error(gateway.request(
            &service.url,
            &json_format,
            RequestMethod::Get,
        )?)?;

        let layers: Vec<LayerSummary> = descriptor
            .get("layers")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| GeodataError::UpstreamError(format!("malformed layer list: {err}")))?
            .unwrap_or_default();
        let first_layer = layers.first().ok_or_else(|| {
            GeodataError::UpstreamError(format!("service '{}' declares no layers", service.name))
        })?;
        let layer_id = first_layer.id;

        let layer_url = format!("{}/{}", service.url, layer_id);
        let layer = check_esri_error(gateway.request(
            &layer_url,
            &json_format,
            RequestMethod::Get,
        )?)?;

        let fields: Vec<FieldInfo> = layer
            .get("fields")
            .filter(|value| !value.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| GeodataError::UpstreamError(format!("malformed field list: {err}")))?
            .unwrap_or_default();
        let object_id_field = layer
            .get("objectIdField")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                fields
                    .iter()
                    .find(|field| field.field_type == "esriFieldTypeOID")
                    .map(|field| field.name.clone())
            })
            .ok_or_else(|| missing_field("objectIdField"))?;

        let spatial_reference: SpatialReference = descriptor
            .get("spatialReference")
            .cloned()
            .ok_or_else(|| missing_field("spatialReference"))
            .and_then(|value| {
                serde_json::from_value(value).map_err(|err| {
                    GeodataError::UpstreamError(format!("malformed spatialReference: {err}"))
                })
            })?;
        let max_page_size = descriptor
            .get("maxRecordCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| missing_field("maxRecordCount"))?;

        let feature_server_url = service.url.clone();
        let query_url = format!("{feature_server_url}/{layer_id}/query");
        let total_feature_count = count_features(gateway, &query_url, &object_id_field)?;
        if total_feature_count > 0 && max_page_size == 0 {
            return Err(GeodataError::UpstreamError(
                "maxRecordCount must be positive for a non-empty layer".to_string(),
            ));
        }
        info!(
            dataset = %service.name,
            total_feature_count,
            max_page_size,
            "resolved layer metadata"
        );

        Ok(LayerMetadata {
            layer_name: layer
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(first_layer.name.as_str())
                .to_string(),
            layer_geometry_type: layer
                .get("geometryType")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| first_layer.geometry_type.clone())
                .unwrap_or_default(),
            object_id_field,
            layer_id,
            last_updated: layer
                .get("editingInfo")
                .and_then(|info| info.get("lastEditDate"))
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_millis),
            total_feature_count,
            max_page_size,
            service_item_id: text_field(&descriptor, "serviceItemId"),
            service_description: text_field(&descriptor, "serviceDescription"),
            supported_query_formats: text_field(&descriptor, "supportedQueryFormats"),
            supported_export_formats: text_field(&descriptor, "supportedExportFormats"),
            capabilities: text_field(&descriptor, "capabilities"),
            description: text_field(&descriptor, "description"),
            copyright_text: text_field(&descriptor, "copyrightText"),
            spatial_reference,
            full_extent: descriptor
                .get("fullExtent")
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok()),
            tables: descriptor
                .get("tables")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            layers,
            fields,
            feature_server_url,
        })
    }
}

// Assumes every real row has an object id greater than zero.
pub fn count_features<G: HttpGateway + ?Sized>(
    gateway: &G,
    layer_query_url: &str,
    object_id_field: &str,
) -> Result<u64, GeodataError> {
    let statistics = json!([{
        "statisticType": "count",
        "onStatisticField": object_id_field,
        "outStatisticFieldName": "COUNT",
    }]);
    let params = [
        ("where", format!("{object_id_field} > 0")),
        ("outStatistics", statistics.to_string()),
        ("f", "json".to_string()),
    ];
    let response = check_esri_error(gateway.request(
        layer_query_url,
        &params,
        RequestMethod::Get,
    )?)?;

    let attributes = response
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| features.first())
        .and_then(|feature| feature.get("attributes"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            GeodataError::UpstreamError("statistics response has no features".to_string())
        })?;

    let count = attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("COUNT"))
        .map(|(_, value)| value)
        .or_else(|| match attributes.len() {
            1 => attributes.values().next(),
            _ => None,
        })
        .and_then(|value| value.as_u64().or_else(|| value.as_f64().map(|v| v.max(0.0) as u64)))
        .ok_or_else(|| missing_field("COUNT"))?;
    debug!(layer_query_url, count, "counted features");
    Ok(count)
}

pub fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn missing_field(name: &str) -> GeodataError {
    GeodataError::UpstreamError(format!("response is missing required field '{name}'"))
}
