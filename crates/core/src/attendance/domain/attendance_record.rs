use serde::Deserialize;

/// A stored check-in as returned by the attendance endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub organization_type: String,
    pub check_in_time: String,
    #[serde(default)]
    pub similarity: Option<f64>,
    pub status: String,
    pub created_at: String,
}
