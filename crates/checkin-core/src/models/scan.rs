use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::participant::ParticipantStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    Success,
    Error,
    Duplicate,
}

/// Audit record of one scan attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLog {
    pub id: String,
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<String>,
    pub scan_time: DateTime<Utc>,
    pub status: ScanOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScanLog {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<String>,
    pub scan_time: DateTime<Utc>,
    pub status: ScanOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/scan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub volunteer_id: Option<String>,
}

impl ScanRequest {
    /// The QR token, if present and not blank.
    pub fn qr_token(&self) -> Option<&str> {
        self.qr_code
            .as_deref()
            .map(str::trim)
            .filter(|qr| !qr.is_empty())
    }
}

/// Scan summary echoed back to the scanning device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub participant_id: String,
    pub participant_name: String,
    pub scan_time: String,
    pub status: ScanOutcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<String>,
}

/// Aggregated participant status counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total: u64,
    pub scanned: u64,
    pub checked_in: u64,
    pub registered: u64,
    pub scan_rate: String,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self {
            total: 0,
            scanned: 0,
            checked_in: 0,
            registered: 0,
            scan_rate: "0".to_string(),
        }
    }
}

impl ScanStats {
    /// Count statuses. Rows without a status add to `total` only.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Option<ParticipantStatus>>,
    {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            match status {
                Some(ParticipantStatus::Scanned) => stats.scanned += 1,
                Some(ParticipantStatus::CheckedIn) => stats.checked_in += 1,
                Some(ParticipantStatus::Registered) => stats.registered += 1,
                None => {}
            }
        }
        stats.scan_rate = format_scan_rate(stats.scanned, stats.total);
        stats
    }
}

fn format_scan_rate(scanned: u64, total: u64) -> String {
    if total == 0 {
        return "0".to_string();
    }
    format!("{:.1}", scanned as f64 / total as f64 * 100.0)
}

/// Timestamp format used on every scan response.
pub fn scan_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repeat(status: ParticipantStatus, n: usize) -> Vec<Option<ParticipantStatus>> {
        vec![Some(status); n]
    }

    #[test]
    fn test_stats_mixed_statuses() {
        let mut statuses = repeat(ParticipantStatus::Registered, 3);
        statuses.extend(repeat(ParticipantStatus::Scanned, 5));
        statuses.extend(repeat(ParticipantStatus::CheckedIn, 2));

        let stats = ScanStats::from_statuses(statuses);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.scanned, 5);
        assert_eq!(stats.checked_in, 2);
        assert_eq!(stats.registered, 3);
        assert_eq!(stats.scan_rate, "50.0");
    }

    #[test]
    fn test_stats_empty() {
        let stats = ScanStats::from_statuses(Vec::new());
        assert_eq!(stats, ScanStats::default());
        assert_eq!(stats.scan_rate, "0");
    }

    #[test]
    fn test_stats_rate_rounds_to_one_decimal() {
        let mut statuses = repeat(ParticipantStatus::Scanned, 1);
        statuses.extend(repeat(ParticipantStatus::Registered, 2));
        assert_eq!(ScanStats::from_statuses(statuses).scan_rate, "33.3");
    }

    #[test]
    fn test_stats_missing_status_counts_toward_total() {
        let stats = ScanStats::from_statuses(vec![None, Some(ParticipantStatus::Scanned)]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.registered, 0);
        assert_eq!(stats.scan_rate, "50.0");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(ScanStats::default()).unwrap();
        assert_eq!(json["checkedIn"], 0);
        assert_eq!(json["scanRate"], "0");
    }

    #[test]
    fn test_scan_request_blank_token() {
        let request: ScanRequest = serde_json::from_str(r#"{"qrCode": "   "}"#).unwrap();
        assert_eq!(request.qr_token(), None);

        let request: ScanRequest =
            serde_json::from_str(r#"{"qrCode": "QR-1", "volunteerId": "v9"}"#).unwrap();
        assert_eq!(request.qr_token(), Some("QR-1"));
        assert_eq!(request.volunteer_id.as_deref(), Some("v9"));
    }

    #[test]
    fn test_scan_timestamp_millis() {
        let at = Utc.with_ymd_and_hms(2025, 8, 16, 18, 30, 0).unwrap();
        assert_eq!(scan_timestamp(at), "2025-08-16T18:30:00.000Z");
    }
}
