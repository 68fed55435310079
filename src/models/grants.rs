use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};
use crate::models::page::Page;

// =============================================================================
// PERMISSION TYPES
// =============================================================================

/// The fixed set of grantable actions. A page declares which of these it
/// supports; a role is granted (page, action) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    View,
    Create,
    Update,
    Delete,
    Assign,
}

impl PermissionAction {
    pub const ALL: [PermissionAction; 5] = [
        PermissionAction::View,
        PermissionAction::Create,
        PermissionAction::Update,
        PermissionAction::Delete,
        PermissionAction::Assign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::View => "view",
            PermissionAction::Create => "create",
            PermissionAction::Update => "update",
            PermissionAction::Delete => "delete",
            PermissionAction::Assign => "assign",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(PermissionAction::View),
            "create" => Some(PermissionAction::Create),
            "update" => Some(PermissionAction::Update),
            "delete" => Some(PermissionAction::Delete),
            "assign" => Some(PermissionAction::Assign),
            _ => None,
        }
    }
}

impl std::fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// GRANT ROWS
// =============================================================================

/// One cell of a role's grant matrix. `grants_for_role` returns a row for
/// every (active page, supported permission) pair; pairs without a stored
/// grant surface as `is_granted = false`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleGrantRow {
    pub page_id: Uuid,
    pub permission: PermissionAction,
    pub is_granted: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbGrantRow {
    pub page_id: Uuid,
    pub permission: String,
    pub is_granted: bool,
}

impl TryFrom<DbGrantRow> for RoleGrantRow {
    type Error = AppError;

    fn try_from(value: DbGrantRow) -> Result<Self, Self::Error> {
        let permission = PermissionAction::parse(&value.permission)
            .ok_or_else(|| AppError::internal(format!("unknown permission type in store: {}", value.permission)))?;

        Ok(RoleGrantRow {
            page_id: value.page_id,
            permission,
            is_granted: value.is_granted,
        })
    }
}

/// Grant state of one permission type, used by the role-editor matrix.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GrantState {
    pub permission: PermissionAction,
    pub granted: bool,
}

/// A page with the grant state of every permission type it supports.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RolePageGrants {
    pub page: Page,
    pub permissions: Vec<GrantState>,
}

// =============================================================================
// REPLACE PAYLOADS
// =============================================================================

/// One entry of the single-page replace form. Explicit `is_granted = false`
/// entries are persisted as-is so the role editor round-trips unchanged
/// checkboxes.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantEntry {
    pub permission: PermissionAction,
    pub is_granted: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplacePageGrantsRequest {
    pub grants: Vec<GrantEntry>,
}

/// One granted pair of the bulk replace form; absence of a pair means deny,
/// so only granted pairs are submitted and stored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantedPagePermission {
    pub page_id: Uuid,
    pub permission: PermissionAction,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceRoleGrantsRequest {
    pub permissions: Vec<GrantedPagePermission>,
}

// =============================================================================
// CHECK RESPONSE
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheck {
    pub has_permission: bool,
    pub page_url: String,
    pub permission_type: PermissionAction,
}

// =============================================================================
// AUDIT RECORD
// =============================================================================

/// Activity-log record for a grant replacement. `page_id` is absent for the
/// bulk (whole-role) form.
#[derive(Debug, Clone, Serialize)]
pub struct GrantReplacement {
    pub role_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<Uuid>,
    pub granted: usize,
}

impl Loggable for GrantReplacement {
    fn entity_type() -> &'static str { "role_grant" }
    fn subject_id(&self) -> Option<Uuid> { self.page_id }
    fn severity(&self) -> Severity { Severity::Critical }
}
