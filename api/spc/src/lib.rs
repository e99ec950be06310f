#[macro_use] extern crate log;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Root of every outlook product path
pub const SPC_PRODUCTS_URL: &str = "https://www.spc.noaa.gov/products/";

/// Timestamp layout of the VALID / EXPIRE / ISSUE properties
pub const SPC_TIME_FORMAT: &str = "%Y%m%d%H%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutlookCategory {
    Convective,
    FireWeather,
}

impl OutlookCategory {
    pub fn label(&self) -> &'static str {
        match self {
            OutlookCategory::Convective => "(SPC) Convective Outlook",
            OutlookCategory::FireWeather => "(SPC) FireWX Outlook",
        }
    }
}

/// One selectable outlook layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlookProduct {
    pub category: OutlookCategory,
    pub label: &'static str,
    /// Path below `SPC_PRODUCTS_URL`
    pub path: &'static str,
}

impl OutlookProduct {
    pub fn url(&self) -> String {
        format!("{}{}", SPC_PRODUCTS_URL, self.path)
    }
}

macro_rules! product {
    ($category:ident, $label:expr, $path:expr) => {
        OutlookProduct {
            category: OutlookCategory::$category,
            label: $label,
            path: $path,
        }
    };
}

/// Every outlook the dashboard offers, in menu order
pub const CATALOG: &[OutlookProduct] = &[
    product!(Convective, "Day 1: Categorical", "outlook/day1otlk_cat.lyr.geojson"),
    product!(Convective, "Day 1: Tornado", "outlook/day1otlk_torn.lyr.geojson"),
    product!(Convective, "Day 1: Hail", "outlook/day1otlk_hail.lyr.geojson"),
    product!(Convective, "Day 1: Wind", "outlook/day1otlk_wind.lyr.geojson"),
    product!(Convective, "Day 2: Categorical", "outlook/day2otlk_cat.lyr.geojson"),
    product!(Convective, "Day 2: Tornado", "outlook/day2otlk_torn.lyr.geojson"),
    product!(Convective, "Day 2: Hail", "outlook/day2otlk_hail.lyr.geojson"),
    product!(Convective, "Day 2: Wind", "outlook/day2otlk_wind.lyr.geojson"),
    product!(Convective, "Day 3: Categorical", "outlook/day3otlk_cat.lyr.geojson"),
    product!(Convective, "Day 3: Probabilistic", "outlook/day3otlk_prob.lyr.geojson"),
    product!(Convective, "Day 4: Probabilistic", "exper/day4-8/day4prob.nolyr.geojson"),
    product!(Convective, "Day 5: Probabilistic", "exper/day4-8/day5prob.nolyr.geojson"),
    product!(Convective, "Day 6: Probabilistic", "exper/day4-8/day6prob.nolyr.geojson"),
    product!(Convective, "Day 7: Probabilistic", "exper/day4-8/day7prob.nolyr.geojson"),
    product!(Convective, "Day 8: Probabilistic", "exper/day4-8/day8prob.nolyr.geojson"),
    product!(FireWeather, "Day 1: Dry Thunderstorms", "fire_wx/day1fw_dryt.lyr.geojson"),
    product!(FireWeather, "Day 1: Wind/LowRH", "fire_wx/day1fw_windrh.lyr.geojson"),
    product!(FireWeather, "Day 2: Dry Thunderstorms", "fire_wx/day2fw_dryt.lyr.geojson"),
    product!(FireWeather, "Day 2: Wind/LowRH", "fire_wx/day2fw_windrh.lyr.geojson"),
    product!(FireWeather, "Day 3: Dry Thunderstorms (Categorical)", "exper/fire_wx/day3fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 3: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day3fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 3: Wind/LowRH (Categorical)", "exper/fire_wx/day3fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 3: Wind/LowRH (Probabilistic)", "exper/fire_wx/day3fw_windrhprob.lyr.geojson"),
    product!(FireWeather, "Day 4: Dry Thunderstorms (Categorical)", "exper/fire_wx/day4fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 4: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day4fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 4: Wind/LowRH (Categorical)", "exper/fire_wx/day4fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 4: Wind/LowRH (Probabilistic)", "exper/fire_wx/day4fw_windrhprob.lyr.geojson"),
    product!(FireWeather, "Day 5: Dry Thunderstorms (Categorical)", "exper/fire_wx/day5fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 5: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day5fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 5: Wind/LowRH (Categorical)", "exper/fire_wx/day5fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 5: Wind/LowRH (Probabilistic)", "exper/fire_wx/day5fw_windrhprob.lyr.geojson"),
    product!(FireWeather, "Day 6: Dry Thunderstorms (Categorical)", "exper/fire_wx/day6fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 6: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day6fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 6: Wind/LowRH (Categorical)", "exper/fire_wx/day6fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 6: Wind/LowRH (Probabilistic)", "exper/fire_wx/day6fw_windrhprob.lyr.geojson"),
    product!(FireWeather, "Day 7: Dry Thunderstorms (Categorical)", "exper/fire_wx/day7fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 7: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day7fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 7: Wind/LowRH (Categorical)", "exper/fire_wx/day7fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 7: Wind/LowRH (Probabilistic)", "exper/fire_wx/day7fw_windrhprob.lyr.geojson"),
    product!(FireWeather, "Day 8: Dry Thunderstorms (Categorical)", "exper/fire_wx/day8fw_drytcat.lyr.geojson"),
    product!(FireWeather, "Day 8: Dry Thunderstorms (Probabilistic)", "exper/fire_wx/day8fw_drytprob.lyr.geojson"),
    product!(FireWeather, "Day 8: Wind/LowRH (Categorical)", "exper/fire_wx/day8fw_windrhcat.lyr.geojson"),
    product!(FireWeather, "Day 8: Wind/LowRH (Probabilistic)", "exper/fire_wx/day8fw_windrhprob.lyr.geojson"),
];

/// Products of one menu cascade
pub fn products_in(category: OutlookCategory) -> impl Iterator<Item = &'static OutlookProduct> {
    CATALOG.iter().filter(move |product| product.category == category)
}

/// Look up a product by its menu label
pub fn find_product(category: OutlookCategory, label: &str) -> Option<&'static OutlookProduct> {
    products_in(category).find(|product| product.label == label)
}

/// One outlook area, ready to draw
#[derive(Debug, Clone, PartialEq)]
pub struct OutlookPolygon {
    /// Risk label, e.g. "SLGT" or "0.05"
    pub label: String,
    /// Long name, e.g. "Slight Risk"
    pub name: Option<String>,
    /// Outer ring as (lat, lon) pairs
    pub vertices: Vec<(f64, f64)>,
    pub valid: Option<DateTime<Utc>>,
    pub expire: Option<DateTime<Utc>>,
    pub issue: Option<DateTime<Utc>>,
    /// Outline color hint from the feed
    pub stroke: Option<String>,
    pub fill: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutlookCollection {
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OutlookFeature {
    geometry: Option<OutlookGeometry>,
    properties: OutlookProperties,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutlookGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct OutlookProperties {
    #[serde(rename = "LABEL")]
    label: Option<String>,
    #[serde(rename = "LABEL2")]
    label2: Option<String>,
    #[serde(rename = "VALID")]
    valid: Option<String>,
    #[serde(rename = "EXPIRE")]
    expire: Option<String>,
    #[serde(rename = "ISSUE")]
    issue: Option<String>,
    stroke: Option<String>,
    fill: Option<String>,
}

/// Parse an SPC outlook GeoJSON document.
///
/// Each member of a MultiPolygon becomes its own polygon. Features without a
/// label or geometry are skipped.
pub fn parse_outlook(body: &[u8]) -> Result<Vec<OutlookPolygon>, anyhow::Error> {
    let collection: OutlookCollection = serde_json::from_slice(body)?;
    let mut polygons = Vec::new();

    for (index, value) in collection.features.into_iter().enumerate() {
        let feature: OutlookFeature = match serde_json::from_value(value) {
            Ok(feature) => feature,
            Err(e) => {
                warn!("Skipping outlook feature {}: {}", index, e);
                continue;
            }
        };

        let Some(label) = feature.properties.label.clone() else {
            warn!("Skipping outlook feature {}: no LABEL", index);
            continue;
        };

        let rings: Vec<Vec<Vec<f64>>> = match feature.geometry {
            Some(OutlookGeometry::Polygon { coordinates }) => coordinates.into_iter().take(1).collect(),
            Some(OutlookGeometry::MultiPolygon { coordinates }) => coordinates
                .into_iter()
                .filter_map(|polygon| polygon.into_iter().next())
                .collect(),
            Some(OutlookGeometry::Unsupported) | None => {
                warn!("Skipping outlook feature {} ({}): no polygon geometry", index, label);
                continue;
            }
        };

        let properties = &feature.properties;
        for ring in rings {
            let vertices = swap_ring(ring);
            if vertices.len() < 3 {
                debug!("Dropping degenerate {} ring with {} vertices", label, vertices.len());
                continue;
            }

            polygons.push(OutlookPolygon {
                label: label.clone(),
                name: properties.label2.clone(),
                vertices,
                valid: parse_spc_time(properties.valid.as_deref()),
                expire: parse_spc_time(properties.expire.as_deref()),
                issue: parse_spc_time(properties.issue.as_deref()),
                stroke: properties.stroke.clone(),
                fill: properties.fill.clone(),
            });
        }
    }

    Ok(polygons)
}

/// GeoJSON [lon, lat] to (lat, lon), dropping anything that is not a pair
fn swap_ring(ring: Vec<Vec<f64>>) -> Vec<(f64, f64)> {
    ring.into_iter()
        .filter_map(|position| match position.as_slice() {
            [lon, lat] => Some((*lat, *lon)),
            _ => None,
        })
        .collect()
}

/// Parse a `YYYYmmddHHMM` UTC timestamp
pub fn parse_spc_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    match NaiveDateTime::parse_from_str(value, SPC_TIME_FORMAT) {
        Ok(naive) => Some(Utc.from_utc_datetime(&naive)),
        Err(e) => {
            debug!("Unreadable outlook time {:?}: {}", value, e);
            None
        }
    }
}

/// Storm Prediction Center outlook client
pub struct SpcOutlookAPI {
    client: Client,
}

impl SpcOutlookAPI {
    pub fn new() -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .user_agent("WarningNav (warningnav@example.com)")
            .build()?;

        Ok(Self { client })
    }

    /// Download one product and parse its polygons
    pub async fn fetch_outlook(&self, product: &OutlookProduct) -> Result<Vec<OutlookPolygon>, anyhow::Error> {
        let url = product.url();
        info!("Retrieving outlooks from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Failed to fetch outlook: HTTP {} ({})", response.status(), url));
        }

        let bytes = response.bytes().await?;
        let polygons = parse_outlook(&bytes)?;
        info!("Parsed {} outlook polygons for {}", polygons.len(), product.label);

        Ok(polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn categorical_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[-100.0, 35.0], [-99.0, 36.0], [-98.0, 35.0], [-100.0, 35.0]]],
                            [[[-90.0, 40.0], [-89.0, 41.0, 12.0], [-89.5, 40.5], [-88.0, 40.0], [-90.0, 40.0]]]
                        ]
                    },
                    "properties": {
                        "DN": 3,
                        "VALID": "202505061300",
                        "EXPIRE": "202505071200",
                        "ISSUE": "202505061238",
                        "LABEL": "SLGT",
                        "LABEL2": "Slight Risk",
                        "stroke": "#DDAA00",
                        "fill": "#FFE066"
                    }
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [[[[-95.0, 30.0], [-94.0, 31.0], [-93.0, 30.0], [-95.0, 30.0]]]]
                    },
                    "properties": { "LABEL2": "no label here" }
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": { "LABEL": "TSTM" }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_each_member_becomes_a_polygon() {
        let polygons = parse_outlook(&categorical_body()).unwrap();
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|p| p.label == "SLGT"));
        assert_eq!(polygons[0].name.as_deref(), Some("Slight Risk"));
        assert_eq!(polygons[0].stroke.as_deref(), Some("#DDAA00"));
    }

    #[test]
    fn test_coordinates_swapped_and_triples_dropped() {
        let polygons = parse_outlook(&categorical_body()).unwrap();
        assert_eq!(polygons[0].vertices[0], (35.0, -100.0));
        assert_eq!(polygons[0].vertices[1], (36.0, -99.0));
        // [-89.0, 41.0, 12.0] is dropped
        assert_eq!(polygons[1].vertices.len(), 4);
        assert_eq!(polygons[1].vertices[1], (40.5, -89.5));
    }

    #[test]
    fn test_times_parsed_as_utc() {
        let polygons = parse_outlook(&categorical_body()).unwrap();
        let issue = polygons[0].issue.unwrap();
        assert_eq!((issue.year(), issue.month(), issue.day()), (2025, 5, 6));
        assert_eq!((issue.hour(), issue.minute()), (12, 38));
        assert!(polygons[0].valid.unwrap() < polygons[0].expire.unwrap());
        assert_eq!(parse_spc_time(Some("2025-05-06")), None);
        assert_eq!(parse_spc_time(None), None);
    }

    #[test]
    fn test_not_a_collection() {
        assert!(parse_outlook(b"not json").is_err());
        assert!(parse_outlook(br#"{"type": "FeatureCollection"}"#).is_err());
    }

    #[test]
    fn test_catalog_urls() {
        let day1 = find_product(OutlookCategory::Convective, "Day 1: Categorical").unwrap();
        assert_eq!(day1.url(), "https://www.spc.noaa.gov/products/outlook/day1otlk_cat.lyr.geojson");

        let fire = find_product(OutlookCategory::FireWeather, "Day 8: Wind/LowRH (Probabilistic)").unwrap();
        assert_eq!(
            fire.url(),
            "https://www.spc.noaa.gov/products/exper/fire_wx/day8fw_windrhprob.lyr.geojson"
        );

        assert_eq!(products_in(OutlookCategory::Convective).count(), 15);
        assert_eq!(products_in(OutlookCategory::FireWeather).count(), 28);
        assert!(CATALOG.iter().all(|product| product.path.ends_with(".geojson")));
    }

    #[test]
    fn test_api_creation() {
        assert!(SpcOutlookAPI::new().is_ok());
    }
}
