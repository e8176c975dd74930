//! Tool model: one physical, uniquely QR-labeled asset.

use serde::{Deserialize, Serialize};

use super::Staff;

/// Availability state of a tool.
///
/// Invariant kept by the transaction engine: `CheckedOut` iff
/// `current_holder` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Available,
    CheckedOut,
}

/// A tool tracked by QR label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Human-readable unique id printed on the label.
    #[serde(default)]
    pub tool_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
    /// Internal id of the staff member currently holding the tool.
    #[serde(default)]
    pub current_holder: Option<String>,
    /// Denormalized last-assignment fields for fast display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assigned_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkin_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkin_at: Option<String>,
}

/// Request body for registering a new tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateToolRequest {
    pub tool_id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Status view of a tool for the scanning screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatusInfo {
    pub tool: Tool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<Staff>,
    pub can_check_out: bool,
    pub can_check_in: bool,
}
