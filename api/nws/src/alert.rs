use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::FeatureParseError;

/// Decimal places kept on every vertex.
pub const COORDINATE_PRECISION: i32 = 3;

/// Alert categories the dashboard knows how to style.
///
/// Ranks follow the NWS priority list (lower is more severe). Events outside
/// the list are kept as `Other` and have neither rank nor color.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKind {
    TornadoWarning,
    SevereThunderstormWarning,
    FlashFloodWarning,
    FireWarning,
    SpecialMarineWarning,
    DustStormWarning,
    HighWindWarning,
    FloodWarning,
    FloodAdvisory,
    FloodWatch,
    SpecialWeatherStatement,
    MarineWeatherStatement,
    Other(String),
}

impl AlertKind {
    /// Every styled kind, most severe first
    pub const KNOWN: [AlertKind; 12] = [
        AlertKind::TornadoWarning,
        AlertKind::SevereThunderstormWarning,
        AlertKind::FlashFloodWarning,
        AlertKind::FireWarning,
        AlertKind::SpecialMarineWarning,
        AlertKind::DustStormWarning,
        AlertKind::HighWindWarning,
        AlertKind::FloodWarning,
        AlertKind::FloodAdvisory,
        AlertKind::FloodWatch,
        AlertKind::SpecialWeatherStatement,
        AlertKind::MarineWeatherStatement,
    ];

    /// Map the `event` property onto a kind
    pub fn from_event(event: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|kind| kind.label() == event.trim())
            .cloned()
            .unwrap_or_else(|| AlertKind::Other(event.trim().to_string()))
    }

    /// Human-readable event name, as the NWS spells it
    pub fn label(&self) -> &str {
        match self {
            AlertKind::TornadoWarning => "Tornado Warning",
            AlertKind::SevereThunderstormWarning => "Severe Thunderstorm Warning",
            AlertKind::FlashFloodWarning => "Flash Flood Warning",
            AlertKind::FireWarning => "Fire Warning",
            AlertKind::SpecialMarineWarning => "Special Marine Warning",
            AlertKind::DustStormWarning => "Dust Storm Warning",
            AlertKind::HighWindWarning => "High Wind Warning",
            AlertKind::FloodWarning => "Flood Warning",
            AlertKind::FloodAdvisory => "Flood Advisory",
            AlertKind::FloodWatch => "Flood Watch",
            AlertKind::SpecialWeatherStatement => "Special Weather Statement",
            AlertKind::MarineWeatherStatement => "Marine Weather Statement",
            AlertKind::Other(label) => label,
        }
    }

    /// Priority rank, lower numbers are more severe
    pub fn priority(&self) -> Option<u32> {
        match self {
            AlertKind::TornadoWarning => Some(2),
            AlertKind::SevereThunderstormWarning => Some(4),
            AlertKind::FlashFloodWarning => Some(5),
            AlertKind::FireWarning => Some(14),
            AlertKind::SpecialMarineWarning => Some(21),
            AlertKind::DustStormWarning => Some(28),
            AlertKind::HighWindWarning => Some(30),
            AlertKind::FloodWarning => Some(39),
            AlertKind::FloodAdvisory => Some(64),
            AlertKind::FloodWatch => Some(89),
            AlertKind::SpecialWeatherStatement => Some(101),
            AlertKind::MarineWeatherStatement => Some(102),
            AlertKind::Other(_) => None,
        }
    }

    /// Display color as a `#RRGGBB` hex code
    pub fn color(&self) -> Option<&'static str> {
        match self {
            AlertKind::TornadoWarning => Some("#FF0000"),
            AlertKind::SevereThunderstormWarning => Some("#FFA500"),
            AlertKind::FlashFloodWarning => Some("#8B0000"),
            AlertKind::FireWarning => Some("#A0522D"),
            AlertKind::SpecialMarineWarning => Some("#FFA500"),
            AlertKind::DustStormWarning => Some("#FFE4C4"),
            AlertKind::HighWindWarning => Some("#DAA520"),
            AlertKind::FloodWarning => Some("#00FF00"),
            AlertKind::FloodAdvisory => Some("#00FF7F"),
            AlertKind::FloodWatch => Some("#2E8B57"),
            AlertKind::SpecialWeatherStatement => Some("#FFE4B5"),
            AlertKind::MarineWeatherStatement => Some("#FFDAB9"),
            AlertKind::Other(_) => None,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One active alert as published by api.weather.gov
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub id: String,
    pub kind: AlertKind,
    /// NWS three-letter event code (e.g. "TOR")
    pub code: Option<String>,
    /// Outer ring as (lat, lon) pairs, `None` for text-only advisories
    pub geometry: Option<Vec<(f64, f64)>>,
    pub time_sent: Option<DateTime<FixedOffset>>,
    pub time_effective: Option<DateTime<FixedOffset>>,
    pub time_onset: Option<DateTime<FixedOffset>>,
    pub time_expires: Option<DateTime<FixedOffset>>,
    pub description: String,
    pub headline: String,
    pub sender: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    id: Option<String>,
    geometry: Option<RawGeometry>,
    properties: Option<RawProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProperties {
    id: Option<String>,
    event: Option<String>,
    event_code: Option<Value>,
    sent: Option<String>,
    effective: Option<String>,
    onset: Option<String>,
    expires: Option<String>,
    parameters: Option<Value>,
    sender_name: Option<String>,
    headline: Option<String>,
    description: Option<String>,
}

impl AlertRecord {
    /// Build a record from one GeoJSON feature of the active-alerts collection.
    ///
    /// Only `id` and `event` are required. Everything else degrades to an
    /// empty value when absent.
    pub fn from_feature(feature: Value) -> Result<Self, FeatureParseError> {
        let id_hint = feature_id(&feature);

        let raw: RawFeature = serde_json::from_value(feature).map_err(|e| FeatureParseError::Malformed {
            id: id_hint.clone(),
            reason: e.to_string(),
        })?;

        let properties = raw.properties.ok_or_else(|| FeatureParseError::MissingProperty {
            id: id_hint.clone(),
            property: "properties",
        })?;

        let id = raw
            .id
            .or_else(|| properties.id.clone())
            .filter(|id| !id.is_empty())
            .ok_or(FeatureParseError::MissingProperty {
                id: None,
                property: "id",
            })?;

        let event = properties
            .event
            .filter(|event| !event.trim().is_empty())
            .ok_or_else(|| FeatureParseError::MissingProperty {
                id: Some(id.clone()),
                property: "event",
            })?;

        let geometry = match raw.geometry {
            None => None,
            Some(geometry) => Some(outer_ring(geometry).map_err(|reason| FeatureParseError::InvalidGeometry {
                id: id.clone(),
                reason,
            })?),
        };

        Ok(Self {
            kind: AlertKind::from_event(&event),
            code: properties.event_code.as_ref().and_then(nws_event_code),
            geometry,
            time_sent: parse_time(&id, "sent", properties.sent.as_deref()),
            time_effective: parse_time(&id, "effective", properties.effective.as_deref()),
            time_onset: parse_time(&id, "onset", properties.onset.as_deref()),
            time_expires: parse_time(&id, "expires", properties.expires.as_deref()),
            description: properties.description.unwrap_or_default(),
            headline: properties.headline.unwrap_or_default(),
            sender: properties.sender_name.unwrap_or_default(),
            parameters: properties.parameters.unwrap_or(Value::Null),
            id,
        })
    }

    /// Whether the alert carries a polygon
    pub fn has_geometry(&self) -> bool {
        self.geometry.as_ref().is_some_and(|ring| !ring.is_empty())
    }
}

/// Best-effort identity of a feature, used when reporting parse failures
pub(crate) fn feature_id(feature: &Value) -> Option<String> {
    feature
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| feature.get("properties").and_then(|p| p.get("id")).and_then(Value::as_str))
        .map(str::to_string)
}

/// Round a coordinate to the rendering precision
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() / scale
}

fn outer_ring(geometry: RawGeometry) -> Result<Vec<(f64, f64)>, String> {
    let ring = match geometry {
        RawGeometry::Polygon { coordinates } => coordinates.into_iter().next(),
        RawGeometry::MultiPolygon { coordinates } => coordinates.into_iter().next().and_then(|p| p.into_iter().next()),
        RawGeometry::Unsupported => return Err("unsupported geometry type".to_string()),
    };

    let ring = ring.ok_or_else(|| "polygon has no rings".to_string())?;

    ring.iter()
        .map(|position| match position.as_slice() {
            // GeoJSON positions are [lon, lat, (alt)]
            [lon, lat, ..] => Ok((round_coordinate(*lat), round_coordinate(*lon))),
            _ => Err(format!("position with {} values", position.len())),
        })
        .collect()
}

fn nws_event_code(event_code: &Value) -> Option<String> {
    event_code
        .get("NationalWeatherService")
        .and_then(Value::as_array)
        .and_then(|codes| codes.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_time(id: &str, field: &str, value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(time) => Some(time),
        Err(e) => {
            debug!("Alert {} has unreadable {} time {:?}: {}", id, field, value, e);
            None
        }
    }
}
