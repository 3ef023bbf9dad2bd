use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of generated QR tokens.
const QR_TOKEN_LEN: usize = 24;

/// Prefix for generated QR tokens so scanned values are recognisable.
const QR_TOKEN_PREFIX: &str = "QR-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipantStatus {
    Registered,
    Scanned,
    CheckedIn,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Registered => "registered",
            ParticipantStatus::Scanned => "scanned",
            ParticipantStatus::CheckedIn => "checked-in",
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<ParticipantStatus>,
    #[serde(default)]
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// A missing status counts as not yet scanned.
    pub fn is_scanned(&self) -> bool {
        self.status == Some(ParticipantStatus::Scanned)
    }
}

/// Registration payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ParticipantStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl NewParticipant {
    /// Fill in registration defaults: `registered` status, registration time,
    /// and a fresh QR token when the caller did not supply one.
    pub fn with_defaults(mut self) -> Self {
        if self.status.is_none() {
            self.status = Some(ParticipantStatus::Registered);
        }
        if self.registration_time.is_none() {
            self.registration_time = Some(Utc::now());
        }
        let missing_qr = self.qr_code.as_deref().map_or(true, |qr| qr.trim().is_empty());
        if missing_qr {
            self.qr_code = Some(generate_qr_token());
        }
        self
    }
}

/// One row of a batch status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: ParticipantStatus,
}

/// Generate a random QR token for a new participant.
pub fn generate_qr_token() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(QR_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", QR_TOKEN_PREFIX, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ParticipantStatus::CheckedIn).unwrap(),
            "\"checked-in\""
        );
        let parsed: ParticipantStatus = serde_json::from_str("\"scanned\"").unwrap();
        assert_eq!(parsed, ParticipantStatus::Scanned);
    }

    #[test]
    fn test_participant_without_status_is_not_scanned() {
        let json = r#"{"id":"p1","name":"Asha","email":"asha@example.com","phone":"555","created_at":"2025-08-16T10:00:00Z"}"#;
        let participant: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(participant.status, None);
        assert!(!participant.is_scanned());
    }

    #[test]
    fn test_parse_participant_row_with_nulls() {
        let json = r#"{"id":"p2","name":"Ravi","email":"ravi@example.com","phone":null,"age":null,"address":null,"emergency_contact":null,"dietary_restrictions":null,"special_needs":null,"registration_time":null,"status":null,"qr_code":"QR-R","created_at":"2025-08-16T10:00:00Z","updated_at":null}"#;
        let participant: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(participant.phone, "");
        assert_eq!(participant.status, None);
        assert_eq!(participant.qr_code.as_deref(), Some("QR-R"));
    }

    #[test]
    fn test_with_defaults_generates_qr_token() {
        let new = NewParticipant {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            qr_code: Some("  ".to_string()),
            ..Default::default()
        }
        .with_defaults();

        let qr = new.qr_code.unwrap();
        assert!(qr.starts_with(QR_TOKEN_PREFIX));
        assert_eq!(qr.len(), QR_TOKEN_PREFIX.len() + QR_TOKEN_LEN);
        assert_eq!(new.status, Some(ParticipantStatus::Registered));
        assert!(new.registration_time.is_some());
    }

    #[test]
    fn test_with_defaults_keeps_supplied_values() {
        let new = NewParticipant {
            name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            status: Some(ParticipantStatus::CheckedIn),
            qr_code: Some("QR-FIXED".to_string()),
            ..Default::default()
        }
        .with_defaults();

        assert_eq!(new.qr_code.as_deref(), Some("QR-FIXED"));
        assert_eq!(new.status, Some(ParticipantStatus::CheckedIn));
    }
}
