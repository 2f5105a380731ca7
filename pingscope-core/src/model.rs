use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaViolation;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Inference algorithm selected for a query. The discriminant is the
/// `model_id` the service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelId {
    MajorityVote = 1,
    Clustering = 2,
}

impl ModelId {
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelId::MajorityVote => "Majority Vote",
            ModelId::Clustering => "Clustering",
        }
    }
}

impl TryFrom<u64> for ModelId {
    type Error = SchemaViolation;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(ModelId::MajorityVote),
            2 => Ok(ModelId::Clustering),
            other => Err(SchemaViolation::UnknownModel { id: other }),
        }
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "majority-vote" | "majority_vote" | "majority" => Ok(ModelId::MajorityVote),
            "2" | "clustering" | "cluster" => Ok(ModelId::Clustering),
            other => Err(format!(
                "unknown model '{other}' (expected majority-vote, clustering, 1 or 2)"
            )),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Network event category. Anything else on the wire is a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Data,
    Voice,
    Sms,
}

impl FromStr for CellType {
    type Err = SchemaViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(CellType::Data),
            "voice" => Ok(CellType::Voice),
            "sms" => Ok(CellType::Sms),
            _ => Err(SchemaViolation::UnknownCellType {
                value: s.to_string(),
            }),
        }
    }
}

/// Validated query, ready to be sent to the inference collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceQuery {
    pub subscriber_id: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub model_id: ModelId,
}

impl InferenceQuery {
    pub fn path(&self) -> String {
        format!("/api/subscribers/{}/infer/", self.subscriber_id)
    }

    /// Absent bounds are omitted rather than defaulted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(start) = self.start_time {
            pairs.push(("start", start.to_rfc3339_opts(SecondsFormat::AutoSi, true)));
        }
        if let Some(end) = self.end_time {
            pairs.push(("end", end.to_rfc3339_opts(SecondsFormat::AutoSi, true)));
        }
        pairs.push(("model_id", self.model_id.wire_id().to_string()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// One ping as the service sends it. `geom` stays textual and `cell_type`
/// stays raw until the scene is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub ping_id: Option<u64>,
    #[serde(rename = "geom")]
    pub geometry: String,
    pub cell_type: String,
    #[serde(rename = "utc_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "state", default)]
    pub observed_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDecimal {
    Number(f64),
    Text(String),
}

impl RawDecimal {
    pub fn to_pct(&self) -> Result<f64, SchemaViolation> {
        let value = match self {
            RawDecimal::Number(v) => Some(*v),
            RawDecimal::Text(s) => s.trim().parse::<f64>().ok(),
        };
        match value {
            Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(v),
            _ => Err(SchemaViolation::MalformedConfidence {
                value: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for RawDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawDecimal::Number(v) => write!(f, "{v}"),
            RawDecimal::Text(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawInference {
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    #[serde(default)]
    pub ping_count: u64,
    pub confidence_pct: RawDecimal,
    pub method: u64,
    pub subscriber: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pings: Vec<PingEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPing {
    pub event: PingEvent,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub center: Coordinate,
    pub radius_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub ping_count: u64,
    pub confidence_pct: f64,
    pub model_id: ModelId,
    pub subscriber_id: u64,
    pub predicted_state: String,
    pub pings: Vec<NormalizedPing>,
}

impl InferenceResult {
    /// Checks the scalar fields and normalizes the pings. Unknown cell types
    /// pass through here; the scene builder rejects them.
    pub fn from_raw(raw: RawInference, max_pings: usize) -> Result<Self, SchemaViolation> {
        let confidence_pct = raw.confidence_pct.to_pct()?;
        let model_id = ModelId::try_from(raw.method)?;
        let pings = crate::normalize::normalize(&raw.pings, max_pings);
        Ok(Self {
            interval_start: raw.interval_start,
            interval_end: raw.interval_end,
            ping_count: raw.ping_count,
            confidence_pct,
            model_id,
            subscriber_id: raw.subscriber,
            predicted_state: raw.state.unwrap_or_default(),
            pings,
        })
    }
}

/// Decodes an inference body. `null` and `[]` are how the service says there
/// were no pings in the window.
pub fn decode_inference_body(body: &str) -> Result<Option<RawInference>, SchemaViolation> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SchemaViolation::Body {
            reason: e.to_string(),
        })?;
    match &value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Array(items) if items.is_empty() => return Ok(None),
        _ => {}
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| SchemaViolation::Body {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BODY: &str = r#"{
        "interval_start": "2024-11-26T00:00:00Z",
        "interval_end": "2024-11-26T05:00:00Z",
        "ping_count": 2,
        "confidence_pct": "66.67",
        "method": 2,
        "subscriber": 12,
        "state": "NY",
        "pings": [
            {"ping_id": 1, "subscriber": 12, "utc_time": "2024-11-26T01:00:00Z",
             "cell_type": "voice", "geom": "SRID=4326;POINT (-74.0 40.7)", "state": "NY"},
            {"ping_id": 2, "subscriber": 12, "utc_time": "2024-11-26T02:00:00Z",
             "cell_type": "data", "geom": "SRID=4326;POINT (-73.9 40.8)", "state": null}
        ]
    }"#;

    fn sample_query() -> InferenceQuery {
        InferenceQuery {
            subscriber_id: 12,
            start_time: Some("2024-11-26T00:00:00Z".parse().unwrap()),
            end_time: None,
            model_id: ModelId::MajorityVote,
        }
    }

    #[test]
    fn query_pairs_omit_absent_bounds() {
        let pairs = sample_query().query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("start", "2024-11-26T00:00:00Z".to_string()),
                ("model_id", "1".to_string()),
            ]
        );
        assert_eq!(sample_query().path(), "/api/subscribers/12/infer/");
    }

    #[test]
    fn query_pairs_keep_sub_second_bounds() {
        let query = InferenceQuery {
            end_time: Some("2024-11-26T05:00:00.750Z".parse().unwrap()),
            ..sample_query()
        };
        assert_eq!(
            query.query_pairs(),
            vec![
                ("start", "2024-11-26T00:00:00Z".to_string()),
                ("end", "2024-11-26T05:00:00.750Z".to_string()),
                ("model_id", "1".to_string()),
            ]
        );
    }

    #[test]
    fn out_of_range_method_is_an_unknown_model() {
        let body = SAMPLE_BODY.replace("\"method\": 2", "\"method\": 300");
        let raw = decode_inference_body(&body).unwrap().unwrap();
        assert_eq!(
            InferenceResult::from_raw(raw, 100),
            Err(SchemaViolation::UnknownModel { id: 300 })
        );
    }

    #[test]
    fn model_id_parses_names_and_ids() {
        assert_eq!("clustering".parse::<ModelId>().unwrap(), ModelId::Clustering);
        assert_eq!("1".parse::<ModelId>().unwrap(), ModelId::MajorityVote);
        assert!("hmm".parse::<ModelId>().is_err());
        assert!(ModelId::try_from(3).is_err());
        assert_eq!(
            ModelId::try_from(300),
            Err(SchemaViolation::UnknownModel { id: 300 })
        );
    }

    #[test]
    fn cell_type_rejects_unknown_values() {
        assert_eq!("SMS".parse::<CellType>().unwrap(), CellType::Sms);
        let err = "fax".parse::<CellType>().unwrap_err();
        assert!(matches!(err, SchemaViolation::UnknownCellType { ref value } if value == "fax"));
    }

    #[test]
    fn confidence_accepts_string_and_number() {
        assert_eq!(RawDecimal::Text("72.50".into()).to_pct().unwrap(), 72.5);
        assert_eq!(RawDecimal::Number(40.0).to_pct().unwrap(), 40.0);
        assert!(RawDecimal::Text("high".into()).to_pct().is_err());
        assert!(RawDecimal::Number(100.5).to_pct().is_err());
    }

    #[test]
    fn decodes_service_body() {
        let raw = decode_inference_body(SAMPLE_BODY).unwrap().unwrap();
        let result = InferenceResult::from_raw(raw, 100).unwrap();
        assert_eq!(result.model_id, ModelId::Clustering);
        assert_eq!(result.predicted_state, "NY");
        assert_eq!(result.pings.len(), 2);
        assert_eq!(result.pings[0].coordinate, Coordinate::new(40.7, -74.0));
        assert_eq!(result.pings[1].event.observed_state, None);
    }

    #[test]
    fn empty_bodies_mean_no_inference() {
        assert_eq!(decode_inference_body("null").unwrap(), None);
        assert_eq!(decode_inference_body("[]").unwrap(), None);
        assert!(matches!(
            decode_inference_body("{\"ping_count\": 1}"),
            Err(SchemaViolation::Body { .. })
        ));
    }
}
