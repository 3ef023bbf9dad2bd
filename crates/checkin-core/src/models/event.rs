use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub capacity: i64,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub registered_count: i64,
    pub created_at: DateTime<Utc>,
}
