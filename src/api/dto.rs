//! Data Transfer Objects
//!
//! Request and response types exchanged with the attendance backend.
//! Fields the backend may omit are optional so partial records still decode.

use serde::{Deserialize, Serialize};

// ============================================
// AUTH DTOs
// ============================================

/// Login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of `/auth/login`, `/auth/refresh` and `/auth/me`
#[derive(Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Name shown in the navigation bar
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.username.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or("User")
    }
}

// ============================================
// PERSONNEL DTOs
// ============================================

/// Personnel record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personnel {
    pub id: u64,
    #[serde(alias = "full_name")]
    pub name: String,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Body for creating or updating personnel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonnelDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
}

// ============================================
// ATTENDANCE DTOs
// ============================================

/// Direction of an attendance event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceType {
    #[default]
    In,
    Out,
}

impl AttendanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceType::In => "in",
            AttendanceType::Out => "out",
        }
    }

    /// Button / timestamp label
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceType::In => "Time In",
            AttendanceType::Out => "Time Out",
        }
    }

    /// Verb used in confirmation toasts
    pub fn verb(&self) -> &'static str {
        match self {
            AttendanceType::In => "checked in",
            AttendanceType::Out => "checked out",
        }
    }
}

impl std::str::FromStr for AttendanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in" | "time_in" => Ok(AttendanceType::In),
            "out" | "time_out" => Ok(AttendanceType::Out),
            other => Err(format!("Unknown attendance type: {}", other)),
        }
    }
}

/// Body for `POST /attendance`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttendance {
    pub personnel_id: u64,
    pub attendance_type: AttendanceType,
    pub source: String,
}

impl NewAttendance {
    /// Record produced by the face capture loop
    pub fn from_face(personnel_id: u64, attendance_type: AttendanceType) -> Self {
        Self {
            personnel_id,
            attendance_type,
            source: "face_recognition".to_string(),
        }
    }
}

/// Attendance record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: u64,
    pub personnel_id: u64,
    #[serde(default)]
    pub personnel_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time_in: Option<String>,
    #[serde(default)]
    pub time_out: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

impl AttendanceRecord {
    /// Whether the backend flagged this record as late
    pub fn is_late(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("late"))
            .unwrap_or(false)
    }

    /// Direction implied by the filled timestamps
    pub fn kind(&self) -> AttendanceType {
        if self.time_out.is_some() {
            AttendanceType::Out
        } else {
            AttendanceType::In
        }
    }

    /// Most recent timestamp on the record
    pub fn timestamp(&self) -> Option<&str> {
        self.time_out.as_deref().or(self.time_in.as_deref())
    }
}

// ============================================
// FACE DTOs
// ============================================

/// Bounding box of a detected face, in source-frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One face found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(rename = "box", default)]
    pub bounds: Option<FaceBox>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub personnel: Option<Personnel>,
}

impl DetectedFace {
    /// Recognized personnel whose confidence reaches the threshold
    pub fn matched(&self, min_confidence: f64) -> Option<&Personnel> {
        if self.confidence >= min_confidence {
            self.personnel.as_ref()
        } else {
            None
        }
    }
}

/// Response of `/face/detect`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub faces: Vec<DetectedFace>,
}

impl DetectionResponse {
    /// First face, when the detection succeeded
    pub fn primary_face(&self) -> Option<&DetectedFace> {
        if self.success {
            self.faces.first()
        } else {
            None
        }
    }
}

// ============================================
// SHARED DTOs
// ============================================

/// Paginated list envelope (`{ "data": [...], "total": n }`)
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: None,
            page: None,
            per_page: None,
        }
    }
}

/// Single-record envelope; the backend names the field `data` or after the resource
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(
        alias = "personnel",
        alias = "attendance",
        alias = "user",
        alias = "schedule"
    )]
    pub data: T,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_display_name_fallbacks() {
        let mut user = User {
            id: 1,
            username: Some("jdoe".to_string()),
            email: None,
            name: Some("Juan Dela Cruz".to_string()),
            role: None,
        };
        assert_eq!(user.display_name(), "Juan Dela Cruz");

        user.name = None;
        assert_eq!(user.display_name(), "jdoe");

        user.username = Some(String::new());
        assert_eq!(user.display_name(), "User");
    }

    #[test]
    fn test_detection_response_decodes_box_field() {
        let json = r#"{
            "success": true,
            "faces": [{
                "box": {"x": 10, "y": 20, "width": 100, "height": 120},
                "confidence": 0.82,
                "personnel": {"id": 7, "name": "Maria Santos", "rank": "FO1"}
            }]
        }"#;
        let response: DetectionResponse = serde_json::from_str(json).unwrap();
        let face = response.primary_face().unwrap();

        assert_eq!(face.bounds.unwrap().width, 100.0);
        assert_eq!(face.matched(0.7).unwrap().name, "Maria Santos");
        assert!(face.matched(0.9).is_none());
    }

    #[test]
    fn test_failed_detection_has_no_primary_face() {
        let response: DetectionResponse =
            serde_json::from_str(r#"{"success": false, "faces": [{"confidence": 0.9}]}"#).unwrap();
        assert!(response.primary_face().is_none());
    }

    #[test]
    fn test_new_attendance_serializes_lowercase_type() {
        let body = NewAttendance::from_face(3, AttendanceType::Out);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["attendance_type"], "out");
        assert_eq!(json["source"], "face_recognition");
    }

    #[test]
    fn test_attendance_record_lateness() {
        let record: AttendanceRecord = serde_json::from_str(
            r#"{"id": 1, "personnel_id": 2, "time_in": "2024-05-01T08:31:00", "status": "Late"}"#,
        )
        .unwrap();
        assert!(record.is_late());
        assert_eq!(record.kind(), AttendanceType::In);
        assert_eq!(record.timestamp(), Some("2024-05-01T08:31:00"));
    }

    #[test]
    fn test_list_response_without_data() {
        let list: ListResponse<Personnel> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(list.data.is_empty());
    }

    #[test]
    fn test_envelope_accepts_resource_named_field() {
        let env: Envelope<Personnel> =
            serde_json::from_str(r#"{"success": true, "personnel": {"id": 9, "name": "X"}}"#)
                .unwrap();
        assert_eq!(env.data.id, 9);

        let env: Envelope<Personnel> =
            serde_json::from_str(r#"{"success": true, "data": {"id": 3, "name": "Y"}}"#).unwrap();
        assert_eq!(env.data.id, 3);
    }

    #[test]
    fn test_personnel_accepts_full_name() {
        let p: Personnel = serde_json::from_str(r#"{"id": 1, "full_name": "A B"}"#).unwrap();
        assert_eq!(p.name, "A B");
    }
}
