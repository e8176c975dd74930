//! Staff model: a person authorized to hold tools.

use serde::{Deserialize, Serialize};

/// Role of a staff member. Affects route authorization, not ledger mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Supervisor,
    #[default]
    Worker,
}

impl StaffRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(StaffRole::Admin),
            "supervisor" => Some(StaffRole::Supervisor),
            "worker" => Some(StaffRole::Worker),
            _ => None,
        }
    }

    /// Whether this role may use the admin seeding endpoints.
    pub fn is_admin(self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Supervisor)
    }
}

/// A staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    /// Human-readable unique job code.
    #[serde(default)]
    pub job_code: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: StaffRole,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Readable ids of tools currently assigned to this staff member,
    /// denormalized for quick "my tools" views. Kept in sync with
    /// `Tool.current_holder` inside the engine's atomic update.
    #[serde(default)]
    pub assigned_tool_ids: Vec<String>,
}

fn default_active() -> bool {
    true
}

/// Request body for registering a new staff member.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    pub job_code: String,
    pub display_name: String,
    #[serde(default)]
    pub role: StaffRole,
    #[serde(default = "default_active")]
    pub active: bool,
}
