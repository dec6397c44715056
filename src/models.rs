use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "Username", default)]
    pub username: Option<String>,
    #[serde(rename = "CollegeEmail", default)]
    pub college_email: Option<String>,
    #[serde(rename = "PersonalEmail", default)]
    pub personal_email: Option<String>,
    #[serde(rename = "Phone", default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(rename = "College", default)]
    pub college: Option<String>,
    #[serde(rename = "Course", default)]
    pub course: Option<String>,
    #[serde(rename = "Year", default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(rename = "BloodGroup", default)]
    pub blood_group: Option<String>,
    #[serde(rename = "MedicalConditions", default)]
    pub medical_conditions: Option<String>,
    #[serde(rename = "Allergies", default)]
    pub allergies: Option<String>,
    #[serde(rename = "Medications", default)]
    pub medications: Option<String>,
    #[serde(rename = "EmergencyContact", default, deserialize_with = "lenient_string")]
    pub emergency_contact: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    #[default]
    Unresolved,
    Resolved,
    /// Any status string the backend sends that this console does not know.
    Other(String),
}

impl ReportStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReportStatus::Unresolved => "Unresolved",
            ReportStatus::Resolved => "Resolved",
            ReportStatus::Other(value) => value,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ReportStatus::Resolved)
    }
}

impl From<String> for ReportStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Unresolved" => ReportStatus::Unresolved,
            "Resolved" => ReportStatus::Resolved,
            _ => ReportStatus::Other(value),
        }
    }
}

impl From<ReportStatus> for String {
    fn from(value: ReportStatus) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("status must not be empty".to_string());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "unresolved" => ReportStatus::Unresolved,
            "resolved" => ReportStatus::Resolved,
            _ => ReportStatus::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "HarasserDetails", default)]
    pub harasser_details: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<GeoPoint>,
    #[serde(rename = "Status", default)]
    pub status: ReportStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<GeoPoint>,
    #[serde(rename = "Time", alias = "createdAt")]
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reports: Vec<ReportRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SirensEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sirens: Vec<AlertRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AckEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Accepts strings, numbers and booleans for free-form profile fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_user_payload() {
        let raw = r#"{
            "success": true,
            "users": [{
                "_id": "65f0c1",
                "Username": "avery_lee",
                "CollegeEmail": "avery@campus.edu",
                "Phone": 5550101,
                "Year": 2026,
                "createdAt": "2026-02-02T10:15:00.000Z"
            }]
        }"#;
        let envelope: UsersEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.success);
        let user = &envelope.users[0];
        assert_eq!(user.id, "65f0c1");
        assert_eq!(user.phone.as_deref(), Some("5550101"));
        assert_eq!(user.year.as_deref(), Some("2026"));
        assert_eq!(user.college, None);
    }

    #[test]
    fn report_status_keeps_unknown_values() {
        let raw = r#"{"_id":"r1","Status":"Escalated","createdAt":"2026-01-01T00:00:00Z"}"#;
        let report: ReportRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(report.status, ReportStatus::Other("Escalated".to_string()));
        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["Status"], "Escalated");
    }

    #[test]
    fn missing_payload_array_defaults_to_empty() {
        let envelope: SirensEnvelope = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!envelope.success);
        assert!(envelope.sirens.is_empty());
    }

    #[test]
    fn maps_url_uses_lat_lon_order() {
        let point = GeoPoint {
            latitude: 12.97,
            longitude: 77.59,
        };
        assert_eq!(point.maps_url(), "https://www.google.com/maps?q=12.97,77.59");
    }
}
