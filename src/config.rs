use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::GeodataError;

pub const CONFIG_FILE_NAME: &str = "ngeo.json";
pub const DEFAULT_CATALOG_URL: &str =
    "https://services3.arcgis.com/BU6Aadhn6tbBEdyk/ArcGIS/rest/services";
pub const DEFAULT_BOUNDARIES_URL: &str = "https://services3.arcgis.com/BU6Aadhn6tbBEdyk/arcgis/rest/services/GRID3_Nigeria_-_State_Boundaries/FeatureServer/0/query";
pub const DEFAULT_BOUNDARY_NAME_FIELD: &str = "statename";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub boundaries_url: Option<String>,
    #[serde(default)]
    pub boundary_name_field: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub preview_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub catalog_url: String,
    pub boundaries_url: String,
    pub boundary_name_field: String,
    pub timeout: Duration,
    pub preview_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GeodataError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let config = match config_path {
            Some(config_path) => Self::load(&config_path)?,
            None => Config::default(),
        };
        Self::resolve_config(config)
    }

    pub fn load(path: &Path) -> Result<Config, GeodataError> {
        let content =
            fs::read_to_string(path).map_err(|_| GeodataError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| GeodataError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GeodataError> {
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(GeodataError::ConfigParse(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        let preview_dir = match config.preview_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_preview_dir()?,
        };

        Ok(ResolvedConfig {
            catalog_url: trim_url(config.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL)),
            boundaries_url: trim_url(
                config
                    .boundaries_url
                    .as_deref()
                    .unwrap_or(DEFAULT_BOUNDARIES_URL),
            ),
            boundary_name_field: config
                .boundary_name_field
                .unwrap_or_else(|| DEFAULT_BOUNDARY_NAME_FIELD.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            preview_dir,
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        project_dirs()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "grid3", "nigeria-geodata")
}

fn default_preview_dir() -> Result<Utf8PathBuf, GeodataError> {
    project_dirs()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().join("previews")).ok())
        .ok_or_else(|| GeodataError::Filesystem("unable to resolve preview directory".to_string()))
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
