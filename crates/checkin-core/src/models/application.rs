use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolunteerApplication {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub duty_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVolunteerApplication {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub duty_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub status: ApplicationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_status_reads_as_pending() {
        let json = r#"{"id":"a1","user_id":"u1","name":"Meera","email":"m@example.com","duty_id":"d1","reason":null,"status":null,"created_at":"2025-08-01T00:00:00Z"}"#;
        let application: VolunteerApplication = serde_json::from_str(json).unwrap();
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert!(application.reason.is_none());
    }
}
