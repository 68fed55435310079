use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};
use crate::models::grants::PermissionAction;

/// A navigable admin-UI unit guarded by permissions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub display_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Page {
    fn entity_type() -> &'static str { "page" }
    fn subject_id(&self) -> Option<Uuid> { Some(self.id) }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPage {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub display_order: i64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPage> for Page {
    type Error = AppError;

    fn try_from(value: DbPage) -> Result<Self, Self::Error> {
        Ok(Page {
            id: value.id,
            name: value.name,
            url: value.url,
            icon: value.icon,
            display_order: value.display_order,
            description: value.description,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// A page together with the permission types it supports. The grouped shape
/// is what the role editor renders; a page never repeats here no matter how
/// many permission types it carries.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageWithPermissions {
    pub page: Page,
    pub permissions: Vec<PermissionAction>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PageCreateRequest {
    #[schema(example = "Buildings")]
    pub name: String,
    #[schema(example = "/buildings")]
    pub url: String,
    #[schema(example = "building")]
    pub icon: Option<String>,
    pub display_order: Option<i64>,
    #[schema(example = "Building portfolio management")]
    pub description: Option<String>,
    /// Permission types this page supports; defaults to the full set.
    pub permissions: Option<Vec<PermissionAction>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PageUpdateRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub display_order: Option<i64>,
    pub description: Option<String>,
}
