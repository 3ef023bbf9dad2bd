//! Client for the hosted database's REST and auth APIs.
//!
//! Table access goes through the PostgREST conventions: filters are query
//! parameters (`qr_code=eq.X`), writes ask for the changed rows back with
//! `Prefer: return=representation`. Every successful write is published on
//! the change bus. Nothing here retries; a failed call is reported once.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::ApiError;
use crate::auth::{Identity, SessionProvider};
use crate::models::{
    Event, NewParticipant, NewScanLog, NewVolunteer, NewVolunteerApplication, Participant,
    ParticipantStatus, ScanLog, StatusUpdate, Table, Volunteer, VolunteerApplication,
};
use crate::realtime::{ChangeBus, ChangeEvent, ChangeKind};
use crate::store::{EventStore, StoreError, StoreResult};

/// Identifies this service in the database's request logs.
const CLIENT_INFO: &str = "checkin-server";

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";

/// Rows whose status is missing or anything other than scanned.
const NOT_SCANNED_FILTER: &str = "(status.is.null,status.neq.scanned)";

#[derive(Debug, Serialize)]
struct StatusPatch {
    status: ParticipantStatus,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StatusUpsertRow<'a> {
    id: &'a str,
    status: ParticipantStatus,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    #[serde(default)]
    status: Option<ParticipantStatus>,
}

/// Client for the hosted database.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct DatabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    bus: ChangeBus,
}

impl DatabaseClient {
    /// Table requests carry the service-role key by default.
    pub fn new(
        base_url: &str,
        service_key: &str,
        anon_key: &str,
        timeout: Duration,
        bus: ChangeBus,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(service_key).context("Service key is not a valid header value")?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", service_key))
                .context("Service key is not a valid header value")?,
        );
        headers.insert("x-client-info", header::HeaderValue::from_static(CLIENT_INFO));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bus,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn changed(&self, table: Table, kind: ChangeKind, id: &str) {
        self.bus.publish(ChangeEvent::new(table, kind, id));
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<T: DeserializeOwned>(table: Table, request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await.map_err(ApiError::from)?;
        let response = Self::check_response(response).await?;
        let text = response.text().await.map_err(ApiError::from)?;
        serde_json::from_str(&text).map_err(|source| StoreError::Decode { table, source })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        debug!(table = %table, ?query, "select");
        let request = self.client.get(self.table_url(table)).query(query);
        Self::send(table, request).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: Table,
        column: &str,
        value: &str,
    ) -> StoreResult<Option<T>> {
        let query = [
            ("select", "*".to_string()),
            (column, format!("eq.{}", value)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<T> = self.select(table, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: Table,
        row: &B,
    ) -> StoreResult<T> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&[row]);
        let rows: Vec<T> = Self::send(table, request).await?;
        rows.into_iter().next().ok_or_else(|| {
            ApiError::InvalidResponse(format!("insert into {} returned no rows", table)).into()
        })
    }

    fn patch_request<B: Serialize>(
        &self,
        table: Table,
        filters: &[(&str, String)],
        body: &B,
    ) -> RequestBuilder {
        self.client
            .patch(self.table_url(table))
            .header("Prefer", PREFER_REPRESENTATION)
            .query(filters)
            .json(body)
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        table: Table,
        filters: &[(&str, String)],
        body: &B,
    ) -> StoreResult<Vec<T>> {
        Self::send(table, self.patch_request(table, filters, body)).await
    }

    /// Set `scanned` only on a row that is not scanned yet.
    fn mark_scanned_request(&self, id: &str) -> RequestBuilder {
        let filters = [
            ("id", format!("eq.{}", id)),
            ("or", NOT_SCANNED_FILTER.to_string()),
            ("select", "*".to_string()),
        ];
        self.patch_request(
            Table::Participants,
            &filters,
            &Self::status_patch(ParticipantStatus::Scanned),
        )
    }

    fn status_patch(status: ParticipantStatus) -> StatusPatch {
        StatusPatch {
            status,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl EventStore for DatabaseClient {
    async fn list_participants(&self) -> StoreResult<Vec<Participant>> {
        let query = [("select", "*".to_string()), ("order", "created_at.desc".to_string())];
        self.select(Table::Participants, &query).await
    }

    async fn find_participant_by_qr(&self, qr_code: &str) -> StoreResult<Option<Participant>> {
        self.select_one(Table::Participants, "qr_code", qr_code).await
    }

    async fn insert_participant(&self, participant: &NewParticipant) -> StoreResult<Participant> {
        let created: Participant = self.insert(Table::Participants, participant).await?;
        self.changed(Table::Participants, ChangeKind::Insert, &created.id);
        Ok(created)
    }

    async fn update_participant_status(
        &self,
        id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Participant> {
        let filters = [("id", format!("eq.{}", id)), ("select", "*".to_string())];
        let rows: Vec<Participant> = self
            .patch(Table::Participants, &filters, &Self::status_patch(status))
            .await?;
        let updated = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            table: Table::Participants,
            id: id.to_string(),
        })?;
        self.changed(Table::Participants, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn mark_participant_scanned(&self, id: &str) -> StoreResult<Option<Participant>> {
        let rows: Vec<Participant> =
            Self::send(Table::Participants, self.mark_scanned_request(id)).await?;
        let updated = rows.into_iter().next();
        if updated.is_some() {
            self.changed(Table::Participants, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn upsert_participant_statuses(
        &self,
        updates: &[StatusUpdate],
    ) -> StoreResult<Vec<Participant>> {
        let now = Utc::now();
        let rows: Vec<StatusUpsertRow<'_>> = updates
            .iter()
            .map(|u| StatusUpsertRow {
                id: &u.id,
                status: u.status,
                updated_at: now,
            })
            .collect();
        let request = self
            .client
            .post(self.table_url(Table::Participants))
            .header("Prefer", PREFER_UPSERT)
            .json(&rows);
        let updated: Vec<Participant> = Self::send(Table::Participants, request).await?;
        for participant in &updated {
            self.changed(Table::Participants, ChangeKind::Update, &participant.id);
        }
        Ok(updated)
    }

    async fn participant_statuses(&self) -> StoreResult<Vec<Option<ParticipantStatus>>> {
        let rows: Vec<StatusRow> = self
            .select(Table::Participants, &[("select", "status".to_string())])
            .await?;
        Ok(rows.into_iter().map(|r| r.status).collect())
    }

    async fn list_volunteers(&self) -> StoreResult<Vec<Volunteer>> {
        let query = [("select", "*".to_string()), ("order", "created_at.desc".to_string())];
        self.select(Table::Volunteers, &query).await
    }

    async fn find_volunteer_by_email(&self, email: &str) -> StoreResult<Option<Volunteer>> {
        self.select_one(Table::Volunteers, "email", email).await
    }

    async fn insert_volunteer(&self, volunteer: &NewVolunteer) -> StoreResult<Volunteer> {
        let created: Volunteer = self.insert(Table::Volunteers, volunteer).await?;
        self.changed(Table::Volunteers, ChangeKind::Insert, &created.id);
        Ok(created)
    }

    async fn insert_scan_log(&self, log: &NewScanLog) -> StoreResult<ScanLog> {
        let created: ScanLog = self.insert(Table::ScanLogs, log).await?;
        self.changed(Table::ScanLogs, ChangeKind::Insert, &created.id);
        Ok(created)
    }

    async fn insert_volunteer_application(
        &self,
        application: &NewVolunteerApplication,
    ) -> StoreResult<VolunteerApplication> {
        let created: VolunteerApplication =
            self.insert(Table::VolunteerApplications, application).await?;
        self.changed(Table::VolunteerApplications, ChangeKind::Insert, &created.id);
        Ok(created)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let query = [("select", "*".to_string()), ("order", "date.asc,time.asc".to_string())];
        self.select(Table::Events, &query).await
    }
}

#[async_trait]
impl SessionProvider for DatabaseClient {
    async fn identify(&self, token: &str) -> Result<Option<Identity>, ApiError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token)
            .send()
            .await?;

        if matches!(response.status().as_u16(), 401 | 403) {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let identity: Identity = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("auth user: {}", e)))?;
        Ok(Some(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> DatabaseClient {
        DatabaseClient::new(base, "service", "anon", Duration::from_secs(5), ChangeBus::new())
            .expect("client builds")
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let db = client("https://db.example.com/");
        assert_eq!(
            db.table_url(Table::ScanLogs),
            "https://db.example.com/rest/v1/scan_logs"
        );
    }

    #[test]
    fn test_invalid_service_key_rejected() {
        let result = DatabaseClient::new(
            "https://db.example.com",
            "bad\nkey",
            "anon",
            Duration::from_secs(5),
            ChangeBus::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mark_scanned_request_is_conditional() {
        let request = client("https://db.example.com")
            .mark_scanned_request("p-42")
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::PATCH);
        assert_eq!(request.url().path(), "/rest/v1/participants");
        let query: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert!(query.contains(&("id".to_string(), "eq.p-42".to_string())));
        assert!(query.contains(&(
            "or".to_string(),
            "(status.is.null,status.neq.scanned)".to_string()
        )));
        assert_eq!(
            request.headers().get("Prefer").and_then(|v| v.to_str().ok()),
            Some(PREFER_REPRESENTATION)
        );
    }

    #[test]
    fn test_status_patch_body() {
        let body = serde_json::to_value(DatabaseClient::status_patch(ParticipantStatus::Scanned)).unwrap();
        assert_eq!(body["status"], "scanned");
        assert!(body["updated_at"].is_string());
    }

    #[test]
    fn test_parse_status_rows() {
        let rows: Vec<StatusRow> =
            serde_json::from_str(r#"[{"status":"registered"},{"status":null},{}]"#).unwrap();
        let statuses: Vec<_> = rows.into_iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Some(ParticipantStatus::Registered), None, None]);
    }

    #[test]
    fn test_parse_auth_user() {
        let json = r#"{"id":"8f1c","aud":"authenticated","email":"gate@example.com","role":"authenticated"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity, Identity::new("8f1c", Some("gate@example.com".to_string())));
    }
}
