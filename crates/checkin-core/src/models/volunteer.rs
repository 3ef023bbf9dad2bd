use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerStatus {
    Active,
    Inactive,
}

/// Duty assigned to a volunteer, stored inline as JSON on the volunteer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedDuty {
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub priority: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub route: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub icon: String,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub shift: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_duty: Option<AssignedDuty>,
    #[serde(default)]
    pub status: Option<VolunteerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewVolunteer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_duty: Option<AssignedDuty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VolunteerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volunteer_with_duty() {
        let json = r#"{
            "id": "v1",
            "name": "Meera",
            "email": "meera@example.com",
            "tasks": ["gate"],
            "assigned_duty": {"id": "d1", "title": "Gate Check-in", "location": "North Gate", "shift": "morning"},
            "status": "active",
            "created_at": "2025-08-10T08:00:00Z"
        }"#;
        let volunteer: Volunteer = serde_json::from_str(json).unwrap();
        assert_eq!(volunteer.status, Some(VolunteerStatus::Active));
        assert_eq!(volunteer.tasks, vec!["gate".to_string()]);
        let duty = volunteer.assigned_duty.unwrap();
        assert_eq!(duty.title, "Gate Check-in");
        assert_eq!(duty.priority, "");
    }

    #[test]
    fn test_parse_volunteer_row_with_nulls() {
        let json = r#"{
            "id": "v2",
            "user_id": null,
            "name": "Kiran",
            "email": "k@example.com",
            "phone": null,
            "role": null,
            "tasks": null,
            "assigned_duty": {"id": null, "title": "Parking", "description": null, "location": null,
                "status": null, "priority": null, "route": null, "icon": null, "shift": null},
            "status": null,
            "join_date": null,
            "created_at": "2025-08-10T08:00:00Z",
            "updated_at": null
        }"#;
        let volunteer: Volunteer = serde_json::from_str(json).unwrap();
        assert!(volunteer.tasks.is_empty());
        assert!(volunteer.status.is_none());
        let duty = volunteer.assigned_duty.unwrap();
        assert_eq!(duty.id, "");
        assert_eq!(duty.title, "Parking");
        assert_eq!(duty.shift, "");
    }

    #[test]
    fn test_parse_volunteer_null_duty() {
        let json = r#"{"id":"v3","name":"Ravi","email":"r@example.com","assigned_duty":null,"created_at":"2025-08-10T08:00:00Z"}"#;
        let volunteer: Volunteer = serde_json::from_str(json).unwrap();
        assert!(volunteer.assigned_duty.is_none());
        assert!(volunteer.tasks.is_empty());
    }
}
