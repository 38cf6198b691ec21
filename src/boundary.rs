use std::sync::OnceLock;

use serde_json::Value;
use tracing::info;

use crate::domain::NigeriaState;
use crate::error::GeodataError;
use crate::http::{HttpGateway, RequestMethod, check_esri_error};

pub trait BoundaryResolver: Send + Sync {
    fn geometry_for_region(&self, name: &str) -> Result<Value, GeodataError>;
}

impl<T: BoundaryResolver + ?Sized> BoundaryResolver for std::sync::Arc<T> {
    fn geometry_for_region(&self, name: &str) -> Result<Value, GeodataError> {
        (**self).geometry_for_region(name)
    }
}

/// State boundaries served as one GeoJSON FeatureCollection.
pub struct StateBoundaries<G: HttpGateway> {
    gateway: G,
    url: String,
    name_field: String,
    features: OnceLock<Vec<Value>>,
}

impl<G: HttpGateway> StateBoundaries<G> {
    pub fn new(gateway: G, url: impl Into<String>, name_field: impl Into<String>) -> Self {
        Self {
            gateway,
            url: url.into(),
            name_field: name_field.into(),
            features: OnceLock::new(),
        }
    }

    fn features(&self) -> Result<&[Value], GeodataError> {
        if let Some(features) = self.features.get() {
            return Ok(features);
        }
        let params = [
            ("where", "1=1".to_string()),
            ("outFields", self.name_field.clone()),
            ("f", "geojson".to_string()),
        ];
        let response =
            check_esri_error(self.gateway.request(&self.url, &params, RequestMethod::Get)?)?;
        let fetched = response
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                GeodataError::UpstreamError("boundary response has no features".to_string())
            })?;
        info!(count = fetched.len(), "loaded state boundaries");
        Ok(self.features.get_or_init(|| fetched))
    }
}

impl<G: HttpGateway> BoundaryResolver for StateBoundaries<G> {
    fn geometry_for_region(&self, name: &str) -> Result<Value, GeodataError> {
        let state: NigeriaState = name.parse()?;
        let wanted = state.boundary_name();
        self.features()?
            .iter()
            .find(|feature| {
                feature
                    .get("properties")
                    .and_then(|properties| properties.get(&self.name_field))
                    .and_then(Value::as_str)
                    .is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted))
            })
            .and_then(|feature| feature.get("geometry"))
            .filter(|geometry| !geometry.is_null())
            .cloned()
            .ok_or_else(|| GeodataError::RegionNotFound(state.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    struct CountingGateway {
        calls: Mutex<usize>,
        body: Value,
    }

    impl HttpGateway for CountingGateway {
        fn request(
            &self,
            _url: &str,
            _params: &[(&'static str, String)],
            _method: RequestMethod,
        ) -> Result<Value, GeodataError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.body.clone())
        }
    }

    fn boundaries() -> StateBoundaries<CountingGateway> {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"statename": "Lagos"},
                    "geometry": {"type": "Polygon", "coordinates": [[[3.0, 6.0], [3.5, 6.0], [3.5, 6.5], [3.0, 6.0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"statename": "Abuja"},
                    "geometry": {"type": "Polygon", "coordinates": [[[7.0, 9.0], [7.5, 9.0], [7.5, 9.5], [7.0, 9.0]]]}
                }
            ]
        });
        StateBoundaries::new(
            CountingGateway {
                calls: Mutex::new(0),
                body,
            },
            "http://boundaries.test/query",
            "statename",
        )
    }

    #[test]
    fn boundaries_are_fetched_once() {
        let resolver = boundaries();
        let lagos = resolver.geometry_for_region("lagos").unwrap();
        assert_eq!(lagos["type"], "Polygon");
        let fct = resolver.geometry_for_region("FCT").unwrap();
        assert_eq!(fct["coordinates"][0][0], json!([7.0, 9.0]));
        assert_eq!(*resolver.gateway.calls.lock().unwrap(), 1);
    }

    #[test]
    fn unknown_state_never_hits_network() {
        let resolver = boundaries();
        let err = resolver.geometry_for_region("Atlantis").unwrap_err();
        assert_matches!(err, GeodataError::RegionNotFound(_));
        assert_eq!(*resolver.gateway.calls.lock().unwrap(), 0);
    }

    #[test]
    fn state_missing_from_dataset_is_not_found() {
        let resolver = boundaries();
        let err = resolver.geometry_for_region("Kano").unwrap_err();
        assert_matches!(err, GeodataError::RegionNotFound(name) if name == "Kano");
    }
}
