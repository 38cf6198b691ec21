use std::sync::OnceLock;

use serde_json::Value;
use tracing::info;

use crate::domain::ServiceSummary;
use crate::error::GeodataError;
use crate::http::{HttpGateway, RequestMethod, check_esri_error};

const NIGERIA_MARKERS: [&str; 2] = ["NGA", "NIGERIA"];

/// Feature services of one ArcGIS catalog that carry Nigerian data.
pub struct Catalog<G: HttpGateway> {
    gateway: G,
    catalog_url: String,
    services: OnceLock<Vec<ServiceSummary>>,
}

impl<G: HttpGateway> Catalog<G> {
    pub fn new(gateway: G, catalog_url: impl Into<String>) -> Self {
        Self {
            gateway,
            catalog_url: catalog_url.into(),
            services: OnceLock::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn list_services(&self) -> Result<&[ServiceSummary], GeodataError> {
        if let Some(services) = self.services.get() {
            return Ok(services);
        }
        let fetched = self.fetch_services()?;
        info!(count = fetched.len(), "loaded GRID3 catalog");
        Ok(self.services.get_or_init(|| fetched))
    }

    pub fn search(&self, query: &str) -> Result<Vec<ServiceSummary>, GeodataError> {
        let needle = query.to_uppercase();
        let results = self
            .list_services()?
            .iter()
            .filter(|service| service.name.to_uppercase().contains(&needle))
            .cloned()
            .collect::<Vec<_>>();
        info!(query, results = results.len(), "catalog search");
        Ok(results)
    }

    pub fn find_exact(&self, name: &str) -> Result<ServiceSummary, GeodataError> {
        self.list_services()?
            .iter()
            .find(|service| service.matches_name(name))
            .cloned()
            .ok_or_else(|| GeodataError::DatasetNotFound(name.to_string()))
    }

    fn fetch_services(&self) -> Result<Vec<ServiceSummary>, GeodataError> {
        let response = self.gateway.request(
            &self.catalog_url,
            &[("f", "json".to_string())],
            RequestMethod::Get,
        )?;
        let response = check_esri_error(response)?;
        let entries: &[Value] = match response.get("services") {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(_) => {
                return Err(GeodataError::UpstreamError(
                    "catalog 'services' is not a list".to_string(),
                ));
            }
            None => &[],
        };
        Ok(entries.iter().filter_map(service_summary).collect())
    }
}

fn service_summary(entry: &Value) -> Option<ServiceSummary> {
    let name = entry.get("name").and_then(Value::as_str)?;
    let upper = name.to_uppercase();
    if !NIGERIA_MARKERS.iter().any(|marker| upper.contains(marker)) {
        return None;
    }
    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())?;
    Some(ServiceSummary {
        name: name.to_string(),
        url: url.to_string(),
        kind: entry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
