use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::GeodataError;

pub type QueryParams = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => write!(f, "GET"),
            RequestMethod::Post => write!(f, "POST"),
        }
    }
}

/// Narrow transport contract used by every catalog and query component.
pub trait HttpGateway: Send + Sync {
    fn request(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        method: RequestMethod,
    ) -> Result<Value, GeodataError>;
}

impl<T: HttpGateway + ?Sized> HttpGateway for &T {
    fn request(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        method: RequestMethod,
    ) -> Result<Value, GeodataError> {
        (**self).request(url, params, method)
    }
}

impl<T: HttpGateway + ?Sized> HttpGateway for std::sync::Arc<T> {
    fn request(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        method: RequestMethod,
    ) -> Result<Value, GeodataError> {
        (**self).request(url, params, method)
    }
}

#[derive(Clone)]
pub struct ReqwestGateway {
    client: Client,
}

impl ReqwestGateway {
    pub fn new(timeout: Duration) -> Result<Self, GeodataError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nigeria-geodata/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeodataError::RequestFailure {
                    url: String::new(),
                    message: err.to_string(),
                })?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GeodataError::RequestFailure {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GeodataError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(GeodataError::ResponseStatus { status, message })
    }
}

impl HttpGateway for ReqwestGateway {
    fn request(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        method: RequestMethod,
    ) -> Result<Value, GeodataError> {
        debug!(%method, url, ?params, "sending request");
        let request = match method {
            RequestMethod::Get => self.client.get(url).query(params),
            RequestMethod::Post => self.client.post(url).form(params),
        };
        let response = request.send().map_err(|err| GeodataError::RequestFailure {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let response = Self::handle_status(response)?;
        let body = response.text().map_err(|err| GeodataError::RequestFailure {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|err| GeodataError::DecodeFailure(err.to_string()))
    }
}

/// ArcGIS reports most failures as a 200 response with an `error` object.
pub fn check_esri_error(value: Value) -> Result<Value, GeodataError> {
    let Some(error) = value.get("error") else {
        return Ok(value);
    };
    let code = error
        .get("code")
        .and_then(Value::as_i64)
        .map(|code| code.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    Err(GeodataError::UpstreamError(format!(
        "ArcGIS error {code}: {message}"
    )))
}
