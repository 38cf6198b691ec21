//! Conversion between GeoJSON geometries and the Esri REST geometry encoding.
//!
//! See <https://developers.arcgis.com/rest/services-reference/enterprise/geometry-objects/>.

use serde_json::{Value, json};

use crate::domain::EsriGeometryType;
use crate::error::GeodataError;

pub fn geojson_type_to_esri_type(kind: &str) -> Result<EsriGeometryType, GeodataError> {
    match kind {
        "Point" => Ok(EsriGeometryType::Point),
        "MultiPoint" => Ok(EsriGeometryType::Multipoint),
        "LineString" => Ok(EsriGeometryType::Polyline),
        "Polygon" | "MultiPolygon" => Ok(EsriGeometryType::Polygon),
        other => Err(GeodataError::UnsupportedGeometryKind(other.to_string())),
    }
}

/// Encodes a GeoJSON geometry as Esri JSON.
///
/// Polygon rings are passed through without winding-order correction.
/// MultiPolygon rings are flattened into a single `rings` list, so ring
/// ownership across the member polygons is not preserved.
pub fn geojson_to_esri_json(geometry: &Value) -> Result<Value, GeodataError> {
    let kind = geometry_kind(geometry)?;
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| GeodataError::InvalidGeometry("missing coordinates".to_string()))?;

    match kind {
        "Point" => {
            let (x, y) = coordinate_pair(coordinates).ok_or_else(|| {
                GeodataError::InvalidGeometry("point coordinates must be [x, y]".to_string())
            })?;
            Ok(json!({ "x": x, "y": y }))
        }
        "LineString" => Ok(json!({ "paths": [coordinates] })),
        "Polygon" => Ok(json!({ "rings": coordinates })),
        "MultiPolygon" => {
            let polygons = coordinates.as_array().ok_or_else(|| {
                GeodataError::InvalidGeometry("multipolygon coordinates must be a list".to_string())
            })?;
            let mut rings = Vec::new();
            for polygon in polygons {
                let polygon_rings = polygon.as_array().ok_or_else(|| {
                    GeodataError::InvalidGeometry("polygon must be a list of rings".to_string())
                })?;
                rings.extend(polygon_rings.iter().cloned());
            }
            Ok(json!({ "rings": rings }))
        }
        other => Err(GeodataError::UnsupportedGeometryKind(other.to_string())),
    }
}

pub fn validate_geometry(geometry: &Value) -> bool {
    let Some(kind) = geometry.get("type").and_then(Value::as_str) else {
        return false;
    };
    let Some(coordinates) = geometry.get("coordinates") else {
        return false;
    };

    match kind {
        "Point" => is_position(coordinates),
        "LineString" | "MultiPoint" => is_non_empty_list_of(coordinates, is_position),
        "Polygon" | "MultiLineString" => is_non_empty_list_of(coordinates, is_line),
        "MultiPolygon" => is_non_empty_list_of(coordinates, |polygon| {
            is_non_empty_list_of(polygon, is_line)
        }),
        _ => false,
    }
}

fn geometry_kind(geometry: &Value) -> Result<&str, GeodataError> {
    geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeodataError::InvalidGeometry("missing geometry type".to_string()))
}

fn coordinate_pair(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

fn is_position(value: &Value) -> bool {
    coordinate_pair(value).is_some()
}

fn is_line(value: &Value) -> bool {
    is_non_empty_list_of(value, is_position)
}

fn is_non_empty_list_of(value: &Value, item: impl Fn(&Value) -> bool) -> bool {
    match value.as_array() {
        Some(items) => !items.is_empty() && items.iter().all(item),
        None => false,
    }
}
