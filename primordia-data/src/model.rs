//! Data model of the Primordia backend contract.
//!
//! These types match the JSON bodies served by `/regions` and `/signals`. A [`SignalBundle`] is
//! immutable once received: a new poll yields a wholly new bundle that replaces the old one.

use chrono::{DateTime, NaiveDateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Backend identifier of a monitored region (eg/ "shanghai", "la_port").
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Display, From,
)]
#[serde(transparent)]
pub struct RegionId(pub SmolStr);

impl RegionId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Geographic bounding box, serialised by the backend as `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl From<[f64; 4]> for BoundingBox {
    fn from([west, south, east, north]: [f64; 4]) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.west, value.south, value.east, value.north]
    }
}

/// Region centre, serialised by the backend as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Centroid {
    pub lng: f64,
    pub lat: f64,
}

impl From<[f64; 2]> for Centroid {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<Centroid> for [f64; 2] {
    fn from(value: Centroid) -> Self {
        [value.lng, value.lat]
    }
}

/// Monitored region. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub bbox: BoundingBox,
    pub centroid: Centroid,
    #[serde(default)]
    pub category: String,
}

/// Physical activity trend reported by the satellite pipeline.
///
/// Unknown trend strings deserialise as [`SatelliteTrend::Stable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SatelliteTrend {
    Expanding,
    Contracting,
    #[default]
    Stable,
}

impl SatelliteTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SatelliteTrend::Expanding => "expanding",
            SatelliteTrend::Contracting => "contracting",
            SatelliteTrend::Stable => "stable",
        }
    }
}

impl From<&str> for SatelliteTrend {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "expanding" => SatelliteTrend::Expanding,
            "contracting" => SatelliteTrend::Contracting,
            _ => SatelliteTrend::Stable,
        }
    }
}

impl<'de> Deserialize<'de> for SatelliteTrend {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(SatelliteTrend::from).unwrap_or_default())
    }
}

impl Serialize for SatelliteTrend {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Raw satellite-derived metrics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SatelliteRaw {
    /// % change vs baseline.
    pub activity_delta_pct: f64,
    #[serde(default)]
    pub night_light_delta_pct: f64,
    /// Measurement reliability, 0-1.
    pub confidence: f64,
    /// 0-1.
    #[serde(default)]
    pub anomaly_strength: f64,
    #[serde(default)]
    pub baseline_window_days: u32,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub last_observation: String,
    #[serde(default)]
    pub trend: SatelliteTrend,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default)]
    pub description: String,
}

/// Raw news and sentiment metrics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewsRaw {
    /// -1 (bearish) to +1 (bullish).
    pub sentiment_score: f64,
    #[serde(default)]
    pub confidence: f64,
    /// Virality / potential manipulation on the backend's 0-100 scale.
    pub hype_intensity: f64,
    #[serde(default)]
    pub headline_volume: u32,
    #[serde(default)]
    pub source_diversity: f64,
    #[serde(default)]
    pub duplicate_ratio: f64,
    #[serde(default)]
    pub pump_lexicon_rate: f64,
    #[serde(default)]
    pub headlines: Vec<Headline>,
    #[serde(default)]
    pub trending_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketData {
    pub ticker: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub change_1w_pct: f64,
    #[serde(default)]
    pub volume: u64,
    /// -1 to 1.
    pub signal_strength: f64,
    #[serde(default)]
    pub trend: String,
}

/// Model-generated reading of the current headlines.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiInsight {
    pub sentiment_score: f64,
    pub confidence: f64,
    pub summary: String,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub model: String,
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Ok,
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Ok => "OK",
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARN",
            AlertLevel::Critical => "CRIT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Per-agent narrative explanation of the current bundle.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Explanation {
    #[serde(default)]
    pub sat_agent: String,
    #[serde(default)]
    pub news_agent: String,
    #[serde(default)]
    pub market_agent: String,
    #[serde(default)]
    pub synthesis: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxySignal {
    pub name: String,
    /// Normalised to [-1, +1].
    pub value: f64,
    pub confidence: f64,
    #[serde(default)]
    pub raw_z_score: f64,
}

/// Fused physical activity index from several observation proxies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PhysicalFusion {
    /// [-1, +1].
    pub fused_signal: f64,
    /// [0, 1], how well the proxies agree.
    pub agreement: f64,
    #[serde(default)]
    pub proxies: Vec<ProxySignal>,
}

/// Per-region, per-poll snapshot served by `/signals`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignalBundle {
    pub region_id: RegionId,
    #[serde(default)]
    pub timestamp: String,
    pub satellite_score: f64,
    pub news_score: f64,
    #[serde(default)]
    pub market_score: Option<f64>,
    /// 0-100.
    pub divergence_score: f64,
    #[serde(default)]
    pub data_mode: String,
    pub satellite_raw: SatelliteRaw,
    pub news_raw: NewsRaw,
    #[serde(default)]
    pub market_data: Option<MarketData>,
    #[serde(default)]
    pub ai_insight: Option<AiInsight>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub explanation: Explanation,
    #[serde(default)]
    pub physical_fusion: Option<PhysicalFusion>,
}

impl SignalBundle {
    /// Check the numeric fields the dashboard renders before the bundle is committed to state.
    pub fn validate(&self) -> Result<(), String> {
        let mut fields = vec![
            ("satellite_score", self.satellite_score),
            ("news_score", self.news_score),
            ("divergence_score", self.divergence_score),
            ("satellite_raw.activity_delta_pct", self.satellite_raw.activity_delta_pct),
            ("satellite_raw.confidence", self.satellite_raw.confidence),
            ("news_raw.sentiment_score", self.news_raw.sentiment_score),
            ("news_raw.hype_intensity", self.news_raw.hype_intensity),
        ];
        if let Some(market_score) = self.market_score {
            fields.push(("market_score", market_score));
        }
        if let Some(fusion) = &self.physical_fusion {
            fields.push(("physical_fusion.fused_signal", fusion.fused_signal));
            fields.push(("physical_fusion.agreement", fusion.agreement));
        }

        if let Some((name, value)) = fields.into_iter().find(|(_, value)| !value.is_finite()) {
            return Err(format!("{name} is not finite ({value})"));
        }

        if self.region_id.as_str().is_empty() {
            return Err("region_id is empty".to_string());
        }

        Ok(())
    }

    /// Parse the backend timestamp, which may or may not carry an offset (naive values are UTC).
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(time) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(time.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Body of `/health`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Per-service availability flags and any other fields the backend reports.
    #[serde(flatten)]
    pub components: BTreeMap<String, serde_json::Value>,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub region_id: RegionId,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Body of `POST /waitlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitlistRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WaitlistResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signals_body() -> serde_json::Value {
        json!({
            "region_id": "suez",
            "timestamp": "2025-01-14T09:30:00.123456",
            "satellite_score": -0.42,
            "news_score": 0.61,
            "market_score": null,
            "divergence_score": 78.4,
            "data_mode": "SAT+NEWS",
            "satellite_raw": {
                "activity_delta_pct": -14.2,
                "night_light_delta_pct": -3.1,
                "confidence": 0.82,
                "anomaly_strength": 0.4,
                "baseline_window_days": 90,
                "data_source": "VIIRS",
                "last_observation": "2025-01-13",
                "trend": "contracting"
            },
            "news_raw": {
                "sentiment_score": 0.55,
                "confidence": 0.7,
                "hype_intensity": 74.0,
                "headline_volume": 23,
                "source_diversity": 0.4,
                "duplicate_ratio": 0.1,
                "pump_lexicon_rate": 0.05,
                "headlines": [
                    {
                        "title": "Canal traffic rebounds",
                        "source": "Wire",
                        "published_at": "2025-01-13T20:00:00Z",
                        "url": "https://example.com/a",
                        "sentiment": 0.6,
                        "description": ""
                    }
                ],
                "trending_topics": ["shipping", "tolls"]
            },
            "market_data": null,
            "ai_insight": null,
            "alerts": [
                { "level": "critical", "message": "HYPE DIVERGENCE", "category": "divergence" },
                { "level": "warning", "message": "High narrative hype detected (74/100)", "category": "hype" }
            ],
            "explanation": {
                "sat_agent": "Physical activity at Suez Canal shows contraction.",
                "news_agent": "Analyzed 23 headlines.",
                "market_agent": "Market data unavailable for this region.",
                "synthesis": "DIVERGENCE: Physical and Narrative signals show significant disagreement."
            }
        })
    }

    #[test]
    fn test_de_signal_bundle() {
        let bundle: SignalBundle = serde_json::from_value(signals_body()).unwrap();

        assert_eq!(bundle.region_id, RegionId::new("suez"));
        assert_eq!(bundle.satellite_raw.trend, SatelliteTrend::Contracting);
        assert_eq!(bundle.news_raw.headlines.len(), 1);
        assert_eq!(bundle.alerts[0].level, AlertLevel::Critical);
        assert_eq!(bundle.alerts[0].title, None);
        assert!(bundle.market_data.is_none());
        assert!(bundle.physical_fusion.is_none());
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_de_unknown_trend_is_stable() {
        for raw in [json!("sideways"), json!(""), json!(null), json!("EXPANDING")] {
            let mut body = signals_body();
            body["satellite_raw"]["trend"] = raw.clone();
            let bundle: SignalBundle = serde_json::from_value(body).unwrap();

            let expected = if raw == json!("EXPANDING") {
                SatelliteTrend::Expanding
            } else {
                SatelliteTrend::Stable
            };
            assert_eq!(bundle.satellite_raw.trend, expected, "trend {raw}");
        }
    }

    #[test]
    fn test_de_unknown_alert_level_is_rejected() {
        let mut body = signals_body();
        body["alerts"][0]["level"] = json!("apocalyptic");
        assert!(serde_json::from_value::<SignalBundle>(body).is_err());
    }

    #[test]
    fn test_de_region() {
        let region: Region = serde_json::from_value(json!({
            "id": "la_port",
            "name": "Port of Los Angeles",
            "description": "Largest US container port",
            "bbox": [-118.35, 33.65, -118.15, 33.82],
            "centroid": [-118.27, 33.74],
            "category": "ports"
        }))
        .unwrap();

        assert_eq!(region.bbox.west, -118.35);
        assert_eq!(region.bbox.north, 33.82);
        assert_eq!(region.centroid.lat, 33.74);
        assert_eq!(
            serde_json::to_value(region.bbox).unwrap(),
            json!([-118.35, 33.65, -118.15, 33.82])
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_scores() {
        let mut bundle: SignalBundle = serde_json::from_value(signals_body()).unwrap();
        bundle.divergence_score = f64::NAN;

        let error = bundle.validate().unwrap_err();
        assert!(error.contains("divergence_score"), "{error}");
    }

    #[test]
    fn test_observed_at() {
        let mut bundle: SignalBundle = serde_json::from_value(signals_body()).unwrap();
        let naive = bundle.observed_at().unwrap();
        assert_eq!(naive.to_rfc3339(), "2025-01-14T09:30:00.123456+00:00");

        bundle.timestamp = "2025-01-14T11:30:00+02:00".to_string();
        let offset = bundle.observed_at().unwrap();
        assert_eq!(offset.to_rfc3339(), "2025-01-14T09:30:00+00:00");

        bundle.timestamp = "yesterday".to_string();
        assert!(bundle.observed_at().is_none());
    }

    #[test]
    fn test_de_health_keeps_components() {
        let health: Health = serde_json::from_value(json!({
            "status": "ok",
            "news_service": true,
            "market_service": false,
            "timestamp": "2025-01-14T09:30:00"
        }))
        .unwrap();

        assert!(health.is_ok());
        assert_eq!(health.components.get("market_service"), Some(&json!(false)));
        assert!(!health.components.contains_key("timestamp"));
    }
}
