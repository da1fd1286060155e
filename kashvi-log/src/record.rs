use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A structured log record as shipped to the document store.
///
/// `request_id` is pulled out of the attributes so correlated records can be
/// indexed and queried directly; everything else the emitter attached lands
/// in `attrs`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub level: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}
