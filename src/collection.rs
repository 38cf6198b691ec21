use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::GeodataError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub geometry: Option<Value>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn from_geojson(value: &Value) -> Result<Self, GeodataError> {
        let object = value.as_object().ok_or_else(|| {
            GeodataError::UpstreamError("feature is not a JSON object".to_string())
        })?;
        Ok(Self {
            geometry: object.get("geometry").filter(|geometry| !geometry.is_null()).cloned(),
            properties: object
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollectionResult {
    pub features: Vec<Feature>,
    pub crs: String,
}

impl FeatureCollectionResult {
    pub fn assemble(features: Vec<Feature>, wkid: i64) -> Self {
        Self {
            features,
            crs: format!("EPSG:{wkid}"),
        }
    }

    pub fn empty(wkid: i64) -> Self {
        Self::assemble(Vec::new(), wkid)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for feature in &self.features {
            for key in feature.properties.keys() {
                if !names.iter().any(|name| name == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }

    pub fn to_geojson(&self) -> Value {
        let features = self
            .features
            .iter()
            .map(|feature| {
                json!({
                    "type": "Feature",
                    "geometry": feature.geometry,
                    "properties": feature.properties,
                })
            })
            .collect::<Vec<_>>();
        json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": self.crs } },
            "features": features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_names_are_first_seen_order() {
        let a = Feature::from_geojson(&json!({
            "type": "Feature",
            "geometry": null,
            "properties": {"name": "A", "ward": "1"}
        }))
        .unwrap();
        let b = Feature::from_geojson(&json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": {"name": "B", "lga": "Ikeja"}
        }))
        .unwrap();
        let collection = FeatureCollectionResult::assemble(vec![a, b], 4326);
        assert_eq!(collection.property_names(), vec!["name", "ward", "lga"]);
        assert_eq!(collection.crs, "EPSG:4326");
        assert!(collection.features[0].geometry.is_none());
    }

    #[test]
    fn geojson_carries_named_crs() {
        let collection = FeatureCollectionResult::empty(3857);
        let value = collection.to_geojson();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "EPSG:3857");
        assert_eq!(value["features"], json!([]));
    }
}
