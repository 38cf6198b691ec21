use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GeodataError {
    #[error("request to {url} failed: {message}")]
    RequestFailure { url: String, message: String },

    #[error("server returned status {status}: {message}")]
    ResponseStatus { status: u16, message: String },

    #[error("failed to decode JSON response: {0}")]
    DecodeFailure(String),

    #[error("the provided data name '{0}' does not exist in the GRID3 catalog")]
    #[diagnostic(help("run `ngeo grid3 search --query <text>` to find dataset names"))]
    DatasetNotFound(String),

    #[error("invalid filter: {0}")]
    #[diagnostic(help("provide exactly one of --state, --bbox or --aoi-geometry"))]
    InvalidFilterArgument(String),

    #[error("invalid bounding box: {0}")]
    #[diagnostic(help("a bounding box is four numbers: min_x, min_y, max_x, max_y"))]
    InvalidBoundingBox(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("unsupported GeoJSON geometry type: {0}")]
    UnsupportedGeometryKind(String),

    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[error("unexpected upstream response: {0}")]
    UpstreamError(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("background worker failed: {0}")]
    Worker(String),
}

impl GeodataError {
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GeodataError::DatasetNotFound(_)
                | GeodataError::InvalidFilterArgument(_)
                | GeodataError::InvalidBoundingBox(_)
                | GeodataError::InvalidGeometry(_)
                | GeodataError::UnsupportedGeometryKind(_)
                | GeodataError::RegionNotFound(_)
        )
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            GeodataError::RequestFailure { .. }
                | GeodataError::ResponseStatus { .. }
                | GeodataError::DecodeFailure(_)
                | GeodataError::UpstreamError(_)
        )
    }
}
