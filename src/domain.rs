use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeodataError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ServiceSummary {
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EsriGeometryType {
    #[serde(rename = "esriGeometryPoint")]
    Point,
    #[serde(rename = "esriGeometryMultipoint")]
    Multipoint,
    #[serde(rename = "esriGeometryPolyline")]
    Polyline,
    #[serde(rename = "esriGeometryPolygon")]
    Polygon,
    #[serde(rename = "esriGeometryEnvelope")]
    Envelope,
}

impl EsriGeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EsriGeometryType::Point => "esriGeometryPoint",
            EsriGeometryType::Multipoint => "esriGeometryMultipoint",
            EsriGeometryType::Polyline => "esriGeometryPolyline",
            EsriGeometryType::Polygon => "esriGeometryPolygon",
            EsriGeometryType::Envelope => "esriGeometryEnvelope",
        }
    }
}

impl fmt::Display for EsriGeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn from_values(values: &[f64]) -> Result<Self, GeodataError> {
        let [min_x, min_y, max_x, max_y] = values else {
            return Err(GeodataError::InvalidBoundingBox(format!(
                "expected four numeric values, got {}",
                values.len()
            )));
        };
        if values.iter().any(|value| !value.is_finite()) {
            return Err(GeodataError::InvalidBoundingBox(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        Ok(Self {
            min_x: *min_x,
            min_y: *min_y,
            max_x: *max_x,
            max_y: *max_y,
        })
    }

    pub fn to_envelope(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

pub fn parse_coordinates(value: &str) -> Result<Vec<f64>, GeodataError> {
    value
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>().map_err(|_| {
                GeodataError::InvalidBoundingBox(format!("'{part}' is not numeric"))
            })
        })
        .collect()
}

impl FromStr for BoundingBox {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_values(&parse_coordinates(value)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    RegionName(String),
    BoundingBox(BoundingBox),
    AoiGeometry(Value),
}

#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    pub region: Option<String>,
    pub bbox: Option<Vec<f64>>,
    pub aoi_geometry: Option<Value>,
}

impl FilterArgs {
    pub fn region(name: impl Into<String>) -> Self {
        Self {
            region: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn bbox(values: impl Into<Vec<f64>>) -> Self {
        Self {
            bbox: Some(values.into()),
            ..Self::default()
        }
    }

    pub fn aoi_geometry(geometry: Value) -> Self {
        Self {
            aoi_geometry: Some(geometry),
            ..Self::default()
        }
    }

    pub fn into_filter(self) -> Result<SpatialFilter, GeodataError> {
        ensure_single_filter(
            self.region.is_some(),
            self.bbox.is_some(),
            self.aoi_geometry.is_some(),
        )?;

        if let Some(region) = self.region {
            return Ok(SpatialFilter::RegionName(region));
        }
        if let Some(values) = self.bbox {
            return Ok(SpatialFilter::BoundingBox(BoundingBox::from_values(&values)?));
        }
        match self.aoi_geometry {
            Some(geometry) => Ok(SpatialFilter::AoiGeometry(geometry)),
            None => Err(GeodataError::InvalidFilterArgument(
                "no filter provided".to_string(),
            )),
        }
    }
}

pub fn ensure_single_filter(region: bool, bbox: bool, aoi: bool) -> Result<(), GeodataError> {
    let provided = [region, bbox, aoi].iter().filter(|set| **set).count();
    if provided != 1 {
        return Err(GeodataError::InvalidFilterArgument(format!(
            "exactly one of region, bbox or aoi geometry must be provided, got {provided}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Collection,
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NigeriaState {
    Abia,
    Adamawa,
    AkwaIbom,
    Anambra,
    Bauchi,
    Bayelsa,
    Benue,
    Borno,
    CrossRiver,
    Delta,
    Ebonyi,
    Edo,
    Ekiti,
    Enugu,
    Gombe,
    Imo,
    Jigawa,
    Kaduna,
    Kano,
    Katsina,
    Kebbi,
    Kogi,
    Kwara,
    Lagos,
    Nasarawa,
    Niger,
    Ogun,
    Ondo,
    Osun,
    Oyo,
    Plateau,
    Rivers,
    Sokoto,
    Taraba,
    Yobe,
    Zamfara,
    Fct,
}

impl NigeriaState {
    pub const ALL: [NigeriaState; 37] = [
        NigeriaState::Abia,
        NigeriaState::Adamawa,
        NigeriaState::AkwaIbom,
        NigeriaState::Anambra,
        NigeriaState::Bauchi,
        NigeriaState::Bayelsa,
        NigeriaState::Benue,
        NigeriaState::Borno,
        NigeriaState::CrossRiver,
        NigeriaState::Delta,
        NigeriaState::Ebonyi,
        NigeriaState::Edo,
        NigeriaState::Ekiti,
        NigeriaState::Enugu,
        NigeriaState::Gombe,
        NigeriaState::Imo,
        NigeriaState::Jigawa,
        NigeriaState::Kaduna,
        NigeriaState::Kano,
        NigeriaState::Katsina,
        NigeriaState::Kebbi,
        NigeriaState::Kogi,
        NigeriaState::Kwara,
        NigeriaState::Lagos,
        NigeriaState::Nasarawa,
        NigeriaState::Niger,
        NigeriaState::Ogun,
        NigeriaState::Ondo,
        NigeriaState::Osun,
        NigeriaState::Oyo,
        NigeriaState::Plateau,
        NigeriaState::Rivers,
        NigeriaState::Sokoto,
        NigeriaState::Taraba,
        NigeriaState::Yobe,
        NigeriaState::Zamfara,
        NigeriaState::Fct,
    ];

    // The capital territory is published as "Abuja".
    pub fn boundary_name(&self) -> &'static str {
        match self {
            NigeriaState::Abia => "Abia",
            NigeriaState::Adamawa => "Adamawa",
            NigeriaState::AkwaIbom => "Akwa Ibom",
            NigeriaState::Anambra => "Anambra",
            NigeriaState::Bauchi => "Bauchi",
            NigeriaState::Bayelsa => "Bayelsa",
            NigeriaState::Benue => "Benue",
            NigeriaState::Borno => "Borno",
            NigeriaState::CrossRiver => "Cross River",
            NigeriaState::Delta => "Delta",
            NigeriaState::Ebonyi => "Ebonyi",
            NigeriaState::Edo => "Edo",
            NigeriaState::Ekiti => "Ekiti",
            NigeriaState::Enugu => "Enugu",
            NigeriaState::Gombe => "Gombe",
            NigeriaState::Imo => "Imo",
            NigeriaState::Jigawa => "Jigawa",
            NigeriaState::Kaduna => "Kaduna",
            NigeriaState::Kano => "Kano",
            NigeriaState::Katsina => "Katsina",
            NigeriaState::Kebbi => "Kebbi",
            NigeriaState::Kogi => "Kogi",
            NigeriaState::Kwara => "Kwara",
            NigeriaState::Lagos => "Lagos",
            NigeriaState::Nasarawa => "Nasarawa",
            NigeriaState::Niger => "Niger",
            NigeriaState::Ogun => "Ogun",
            NigeriaState::Ondo => "Ondo",
            NigeriaState::Osun => "Osun",
            NigeriaState::Oyo => "Oyo",
            NigeriaState::Plateau => "Plateau",
            NigeriaState::Rivers => "Rivers",
            NigeriaState::Sokoto => "Sokoto",
            NigeriaState::Taraba => "Taraba",
            NigeriaState::Yobe => "Yobe",
            NigeriaState::Zamfara => "Zamfara",
            NigeriaState::Fct => "Abuja",
        }
    }
}

impl fmt::Display for NigeriaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NigeriaState::Fct => write!(f, "FCT"),
            other => write!(f, "{}", other.boundary_name()),
        }
    }
}

impl FromStr for NigeriaState {
    type Err = GeodataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_region(value);
        if normalized == "fct" {
            return Ok(NigeriaState::Fct);
        }
        NigeriaState::ALL
            .into_iter()
            .find(|state| normalize_region(state.boundary_name()) == normalized)
            .ok_or_else(|| GeodataError::RegionNotFound(value.trim().to_string()))
    }
}

fn normalize_region(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            '_' | '-' => ' ',
            other => other.to_ascii_lowercase(),
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataSource {
    pub name: &'static str,
    pub url: &'static str,
    pub description: &'static str,
}

impl DataSource {
    pub const GRID3: DataSource = DataSource {
        name: "GRID3",
        url: "https://grid3.org/",
        description: "Country-wide population estimates, settlements, subnational boundaries and critical infrastructure for Nigeria.",
    };

    pub fn list_sources() -> Vec<DataSource> {
        vec![DataSource::GRID3]
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_state_names() {
        assert_eq!("lagos".parse::<NigeriaState>().unwrap(), NigeriaState::Lagos);
        assert_eq!(
            "akwa_ibom".parse::<NigeriaState>().unwrap(),
            NigeriaState::AkwaIbom
        );
        assert_eq!(
            " Cross  River ".parse::<NigeriaState>().unwrap(),
            NigeriaState::CrossRiver
        );
        assert_eq!("FCT".parse::<NigeriaState>().unwrap(), NigeriaState::Fct);
        assert_eq!("abuja".parse::<NigeriaState>().unwrap(), NigeriaState::Fct);
    }

    #[test]
    fn parse_state_unknown() {
        let err = "Lagos Invalid State".parse::<NigeriaState>().unwrap_err();
        assert_matches!(err, GeodataError::RegionNotFound(_));
    }

    #[test]
    fn bbox_from_string() {
        let bbox: BoundingBox = "20.0, 12.3, 21.4, 34.5".parse().unwrap();
        assert_eq!(bbox.to_envelope(), "20,12.3,21.4,34.5");
    }

    #[test]
    fn bbox_rejects_wrong_arity_and_text() {
        assert_matches!(
            BoundingBox::from_values(&[1.0, 2.0, 3.0, 4.0, 56.0]),
            Err(GeodataError::InvalidBoundingBox(_))
        );
        assert_matches!(
            "1, 2, north, 4".parse::<BoundingBox>(),
            Err(GeodataError::InvalidBoundingBox(_))
        );
        assert_matches!(
            BoundingBox::from_values(&[1.0, f64::NAN, 3.0, 4.0]),
            Err(GeodataError::InvalidBoundingBox(_))
        );
    }

    #[test]
    fn filter_args_require_exactly_one() {
        assert_matches!(
            FilterArgs::default().into_filter(),
            Err(GeodataError::InvalidFilterArgument(_))
        );
        let both = FilterArgs {
            region: Some("Lagos".to_string()),
            bbox: Some(vec![1.0, 2.0, 3.0, 4.0]),
            aoi_geometry: None,
        };
        assert_matches!(
            both.into_filter(),
            Err(GeodataError::InvalidFilterArgument(_))
        );
        assert_matches!(
            FilterArgs::region("Lagos").into_filter(),
            Ok(SpatialFilter::RegionName(name)) if name == "Lagos"
        );
    }

    #[test]
    fn geometry_type_serializes_as_esri_tag() {
        let value = serde_json::to_value(EsriGeometryType::Polyline).unwrap();
        assert_eq!(value, serde_json::json!("esriGeometryPolyline"));
    }
}
