#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use serde_json::{Value, json};

use nigeria_geodata::boundary::BoundaryResolver;
use nigeria_geodata::catalog::Catalog;
use nigeria_geodata::collection::FeatureCollectionResult;
use nigeria_geodata::error::GeodataError;
use nigeria_geodata::http::{HttpGateway, RequestMethod};
use nigeria_geodata::preview::{PreviewHandle, PreviewSink};

pub const CATALOG_URL: &str = "http://grid3.test/arcgis/rest/services";
pub const OBJECT_ID_FIELD: &str = "FID";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: RequestMethod,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

enum Scripted {
    Json(Value),
    Status(u16),
}

/// In-memory gateway answering from per-(method, url) response queues.
///
/// The last queued response for a route is repeated once the queue drains.
/// Every request is recorded, including ones with no scripted answer.
#[derive(Default)]
pub struct MockGateway {
    routes: Mutex<HashMap<(String, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: RequestMethod, url: &str, body: Value) -> &Self {
        self.push(method, url, Scripted::Json(body));
        self
    }

    pub fn fail(&self, method: RequestMethod, url: &str, status: u16) -> &Self {
        self.push(method, url, Scripted::Status(status));
        self
    }

    fn push(&self, method: RequestMethod, url: &str, scripted: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method.to_string(), url.to_string()))
            .or_default()
            .push_back(scripted);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: RequestMethod, url: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.url == url)
            .collect()
    }
}

impl HttpGateway for MockGateway {
    fn request(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        method: RequestMethod,
    ) -> Result<Value, GeodataError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        });

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&(method.to_string(), url.to_string()))
            .ok_or_else(|| GeodataError::RequestFailure {
                url: url.to_string(),
                message: format!("no scripted response for {method} {url}"),
            })?;
        let scripted = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|scripted| match scripted {
                Scripted::Json(body) => Scripted::Json(body.clone()),
                Scripted::Status(status) => Scripted::Status(*status),
            })
        };
        match scripted {
            Some(Scripted::Json(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(GeodataError::ResponseStatus {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(GeodataError::RequestFailure {
                url: url.to_string(),
                message: "empty response queue".to_string(),
            }),
        }
    }
}

pub fn service_url(name: &str) -> String {
    format!("{CATALOG_URL}/{name}/FeatureServer")
}

pub fn query_url(name: &str) -> String {
    format!("{}/0/query", service_url(name))
}

pub fn catalog_body(names: &[&str]) -> Value {
    let services = names
        .iter()
        .map(|name| json!({"name": name, "type": "FeatureServer", "url": service_url(name)}))
        .collect::<Vec<_>>();
    json!({"currentVersion": 11.3, "services": services})
}

pub fn catalog_with(gateway: MockGateway, names: &[&str]) -> Catalog<MockGateway> {
    gateway.on(RequestMethod::Get, CATALOG_URL, catalog_body(names));
    Catalog::new(gateway, CATALOG_URL)
}

pub fn script_dataset(gateway: &MockGateway, name: &str, total: u64, max_page: u64, wkid: i64) {
    let url = service_url(name);
    gateway.on(
        RequestMethod::Get,
        &url,
        json!({
            "serviceDescription": "<p>Health facilities</p>",
            "serviceItemId": "abc123",
            "maxRecordCount": max_page,
            "supportedQueryFormats": "JSON, geoJSON, PBF",
            "supportedExportFormats": "csv,shapefile",
            "capabilities": "Query",
            "description": "<div>GRID3 <b>health</b> facilities&nbsp;dataset</div>",
            "copyrightText": "GRID3",
            "spatialReference": {"wkid": wkid, "latestWkid": wkid},
            "fullExtent": {"xmin": 2.7, "ymin": 4.2, "xmax": 14.6, "ymax": 13.9},
            "layers": [{"id": 0, "name": name, "geometryType": "esriGeometryPoint"}],
            "tables": []
        }),
    );
    gateway.on(
        RequestMethod::Get,
        &format!("{url}/0"),
        json!({
            "id": 0,
            "name": name,
            "geometryType": "esriGeometryPoint",
            "objectIdField": OBJECT_ID_FIELD,
            "fields": [
                {"name": OBJECT_ID_FIELD, "type": "esriFieldTypeOID", "alias": "FID"},
                {"name": "facility_name", "type": "esriFieldTypeString", "alias": "Facility"}
            ],
            "editingInfo": {"lastEditDate": 1700000000000i64}
        }),
    );
    gateway.on(
        RequestMethod::Get,
        &query_url(name),
        json!({"features": [{"attributes": {"COUNT": total}}]}),
    );
}

pub fn page(start: u64, count: u64) -> Value {
    let features = (start..start + count)
        .map(|index| {
            json!({
                "type": "Feature",
                "id": index + 1,
                "geometry": {"type": "Point", "coordinates": [3.3 + index as f64 * 1e-4, 6.5]},
                "properties": {OBJECT_ID_FIELD: index + 1, "facility_name": format!("Facility {}", index + 1)}
            })
        })
        .collect::<Vec<_>>();
    json!({"type": "FeatureCollection", "features": features})
}

pub fn lagos_polygon() -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[2.7, 6.4], [4.35, 6.4], [4.35, 6.7], [2.7, 6.7], [2.7, 6.4]]]
    })
}

#[derive(Default)]
pub struct FixedBoundaries {
    pub lookups: Mutex<Vec<String>>,
}

impl BoundaryResolver for FixedBoundaries {
    fn geometry_for_region(&self, name: &str) -> Result<Value, GeodataError> {
        self.lookups.lock().unwrap().push(name.to_string());
        if name.eq_ignore_ascii_case("lagos") {
            Ok(lagos_polygon())
        } else {
            Err(GeodataError::RegionNotFound(name.to_string()))
        }
    }
}

#[derive(Default)]
pub struct RecordingPreview {
    pub rendered: Mutex<Vec<usize>>,
}

impl PreviewSink for RecordingPreview {
    fn render(&self, collection: &FeatureCollectionResult) -> Result<PreviewHandle, GeodataError> {
        self.rendered.lock().unwrap().push(collection.len());
        Ok(PreviewHandle {
            path: Utf8PathBuf::from("preview.geojson"),
            feature_count: collection.len(),
            crs: collection.crs.clone(),
        })
    }
}
