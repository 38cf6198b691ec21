use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::collection::FeatureCollectionResult;
use crate::domain::{DataSource, ServiceSummary};
use crate::grid3::FilterOutput;
use crate::metadata::LayerMetadata;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn phase(phase: &str, detail: impl AsRef<str>) -> Self {
        Self {
            message: format!("phase={phase}; {}", detail.as_ref()),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_services(services: &[ServiceSummary]) -> io::Result<()> {
        Self::print_json(&services)
    }

    pub fn print_info(metadata: &LayerMetadata) -> io::Result<()> {
        Self::print_json(metadata)
    }

    pub fn print_filter(output: &FilterOutput) -> io::Result<()> {
        match output {
            FilterOutput::Collection(collection) => Self::print_json(&collection.to_geojson()),
            FilterOutput::Preview(handle) => Self::print_json(handle),
        }
    }

    pub fn print_sources(sources: &[DataSource]) -> io::Result<()> {
        Self::print_json(&sources)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_services(services: &[ServiceSummary]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if services.is_empty() {
            writeln!(stdout, "no matching datasets")?;
            return Ok(());
        }
        for (index, service) in services.iter().enumerate() {
            writeln!(stdout, "{:>4}  {}  ({})", index + 1, service.name, service.kind)?;
        }
        Ok(())
    }

    pub fn print_info(metadata: &LayerMetadata) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for (label, value) in info_rows(metadata) {
            writeln!(stdout, "{label:<22} {value}")?;
        }
        Ok(())
    }

    pub fn print_collection(collection: &FeatureCollectionResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{} features ({})", collection.len(), collection.crs)?;
        let columns = collection.property_names();
        for feature in &collection.features {
            let cells = columns
                .iter()
                .map(|column| {
                    let value = feature.properties.get(column).map(cell_text);
                    format!("{column}={}", value.unwrap_or_default())
                })
                .collect::<Vec<_>>();
            writeln!(stdout, "- {}", cells.join(", "))?;
        }
        Ok(())
    }

    pub fn print_sources(sources: &[DataSource]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for source in sources {
            writeln!(stdout, "{}  {}\n      {}", source.name, source.url, source.description)?;
        }
        Ok(())
    }
}

pub fn info_rows(metadata: &LayerMetadata) -> Vec<(&'static str, String)> {
    let extent = metadata
        .full_extent
        .as_ref()
        .map(|extent| {
            format!(
                "{}, {}, {}, {}",
                extent.xmin, extent.ymin, extent.xmax, extent.ymax
            )
        })
        .unwrap_or_else(|| "n/a".to_string());
    vec![
        ("Layer", metadata.layer_name.clone()),
        ("Geometry type", metadata.layer_geometry_type.clone()),
        ("Features", metadata.total_feature_count.to_string()),
        ("Page size", metadata.max_page_size.to_string()),
        ("Object id field", metadata.object_id_field.clone()),
        ("CRS", metadata.crs()),
        ("Extent", extent),
        (
            "Last updated",
            metadata
                .last_updated
                .map(|date| date.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "n/a".to_string()),
        ),
        ("Capabilities", metadata.capabilities.clone()),
        ("Query formats", metadata.supported_query_formats.clone()),
        ("Fields", metadata.fields.len().to_string()),
        ("Service item", metadata.service_item_id.clone()),
        ("Server", metadata.feature_server_url.clone()),
        ("Copyright", metadata.copyright_text.clone()),
        ("Description", metadata.plain_description()),
    ]
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
