//! Effective permission resolution.
//!
//! Evaluation order for a check:
//! 1. superuser capability -> allow (no grant row can override it)
//! 2. unknown or deactivated page url -> deny
//! 3. stored grant row -> its value; no row -> deny

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{catalog, grants, AllowReason, Decision, DenyReason};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::grants::{GrantState, PermissionAction, RolePageGrants};
use crate::models::page::{DbPage, Page};

/// Pages the identity may see in the sidebar: everything active for the
/// superuser, otherwise the pages with a granted `view` row for the role.
pub async fn visible_pages(pool: &SqlitePool, auth: &AuthUser) -> AppResult<Vec<Page>> {
    if auth.is_superuser {
        return catalog::list_active_pages(pool).await;
    }

    let pages = sqlx::query_as::<_, DbPage>(
        r#"
        SELECT DISTINCT p.id, p.name, p.url, p.icon, p.display_order, p.description, p.is_active, p.created_at, p.updated_at
        FROM pages p
        INNER JOIN role_page_grants g ON g.page_id = p.id
        WHERE p.is_active = 1
          AND g.role_id = ?
          AND g.permission = 'view'
          AND g.is_granted = 1
        ORDER BY p.display_order, p.name
        "#,
    )
    .bind(auth.role_id)
    .fetch_all(pool)
    .await?;

    pages.into_iter().map(Page::try_from).collect()
}

/// Can this identity perform `action` on the page at `page_url`?
pub async fn check(
    pool: &SqlitePool,
    auth: &AuthUser,
    page_url: &str,
    action: PermissionAction,
) -> AppResult<Decision> {
    if auth.is_superuser {
        tracing::debug!(user_id = %auth.user_id, page_url, action = %action, "superuser bypass");
        return Ok(Decision::Allow(AllowReason::SuperuserBypass));
    }

    let Some(page) = catalog::find_active_page_by_url(pool, page_url).await? else {
        tracing::debug!(user_id = %auth.user_id, role_id = auth.role_id, page_url, "unknown page");
        return Ok(Decision::Deny(DenyReason::UnknownPage));
    };

    let row: Option<bool> = sqlx::query_scalar(
        "SELECT is_granted FROM role_page_grants WHERE role_id = ? AND page_id = ? AND permission = ?",
    )
    .bind(auth.role_id)
    .bind(page.id)
    .bind(action.as_str())
    .fetch_optional(pool)
    .await?;

    let decision = match row {
        Some(true) => Decision::Allow(AllowReason::Granted),
        Some(false) => Decision::Deny(DenyReason::Revoked),
        None => Decision::Deny(DenyReason::NoGrant),
    };

    tracing::debug!(
        user_id = %auth.user_id,
        role_id = auth.role_id,
        page_url,
        action = %action,
        outcome = decision.reason(),
        "permission check"
    );

    Ok(decision)
}

/// The role-editor matrix: every active page with the grant state of every
/// permission type it supports. Pages with no grants yet still appear fully
/// enumerated (all ungranted), never omitted.
pub async fn role_matrix(pool: &SqlitePool, role_id: i64) -> AppResult<Vec<RolePageGrants>> {
    let pages = catalog::list_active_pages(pool).await?;
    let rows = grants::grants_for_role(pool, role_id).await?;

    let mut by_page: std::collections::HashMap<Uuid, Vec<GrantState>> = std::collections::HashMap::new();
    for row in rows {
        by_page.entry(row.page_id).or_default().push(GrantState {
            permission: row.permission,
            granted: row.is_granted,
        });
    }

    Ok(pages
        .into_iter()
        .map(|page| {
            let permissions = by_page.remove(&page.id).unwrap_or_default();
            RolePageGrants { page, permissions }
        })
        .collect())
}
