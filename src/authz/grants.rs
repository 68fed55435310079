//! Grant matrix store: the only mutation surface of the authorization core.
//!
//! Both replace operations validate their payload against the catalog before
//! a transaction opens and then delete-and-insert inside one transaction, so
//! the matrix is never observable in a partially applied state and a failed
//! replace leaves the previous grants intact.

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{catalog, ADMIN_ROLE_ID};
use crate::errors::{AppError, AppResult};
use crate::models::grants::{DbGrantRow, GrantEntry, GrantedPagePermission, PermissionAction, RoleGrantRow};
use crate::utils::utc_now;

/// Full grant matrix of a role: one row per (active page, supported
/// permission) pair, with pairs lacking a stored grant reading as
/// `is_granted = false`. The admin role reports every pair granted since its
/// bypass is not backed by rows.
pub async fn grants_for_role(pool: &SqlitePool, role_id: i64) -> AppResult<Vec<RoleGrantRow>> {
    let rows = sqlx::query_as::<_, DbGrantRow>(
        r#"
        SELECT p.id AS page_id, pp.permission AS permission,
               COALESCE(g.is_granted, 0) AS is_granted
        FROM pages p
        INNER JOIN page_permissions pp ON pp.page_id = p.id
        LEFT JOIN role_page_grants g
              ON g.page_id = p.id AND g.permission = pp.permission AND g.role_id = ?
        WHERE p.is_active = 1
        ORDER BY p.display_order, p.name, pp.permission
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await?;

    let mut grants: Vec<RoleGrantRow> = rows
        .into_iter()
        .map(RoleGrantRow::try_from)
        .collect::<Result<_, _>>()?;

    if role_id == ADMIN_ROLE_ID {
        for grant in &mut grants {
            grant.is_granted = true;
        }
    }

    Ok(grants)
}

/// Replace a role's grants for a single page. Submitted entries are stored
/// verbatim, explicit `is_granted = false` rows included, so the role editor
/// round-trips exactly what it sent.
pub async fn replace_page_grants(
    pool: &SqlitePool,
    role_id: i64,
    page_id: Uuid,
    entries: &[GrantEntry],
) -> AppResult<()> {
    reject_admin_role(role_id)?;

    let page = catalog::fetch_active_page(pool, page_id).await?;
    let supported: HashSet<PermissionAction> = catalog::supported_permissions(pool, page.id)
        .await?
        .into_iter()
        .collect();

    let mut seen = HashSet::new();
    for entry in entries {
        if !supported.contains(&entry.permission) {
            return Err(AppError::bad_request(format!(
                "page `{}` does not support permission `{}`",
                page.url, entry.permission
            )));
        }
        if !seen.insert(entry.permission) {
            return Err(AppError::bad_request(format!(
                "duplicate permission `{}` in payload",
                entry.permission
            )));
        }
    }

    let now = utc_now();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_page_grants WHERE role_id = ? AND page_id = ?")
        .bind(role_id)
        .bind(page_id)
        .execute(&mut *tx)
        .await?;

    for entry in entries {
        sqlx::query(
            "INSERT INTO role_page_grants (role_id, page_id, permission, is_granted, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(role_id)
        .bind(page_id)
        .bind(entry.permission.as_str())
        .bind(entry.is_granted)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Replace a role's entire grant set. Only granted pairs are submitted and
/// stored; absence of a pair means deny.
pub async fn replace_role_grants(
    pool: &SqlitePool,
    role_id: i64,
    granted: &[GrantedPagePermission],
) -> AppResult<()> {
    reject_admin_role(role_id)?;

    let pairs = active_catalog_pairs(pool).await?;
    let mut seen = HashSet::new();
    for grant in granted {
        if !pairs.contains(&(grant.page_id, grant.permission)) {
            return Err(AppError::bad_request(format!(
                "unknown page `{}` or unsupported permission `{}`",
                grant.page_id, grant.permission
            )));
        }
        if !seen.insert((grant.page_id, grant.permission)) {
            return Err(AppError::bad_request(format!(
                "duplicate grant for page `{}` permission `{}`",
                grant.page_id, grant.permission
            )));
        }
    }

    let now = utc_now();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_page_grants WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    for grant in granted {
        sqlx::query(
            "INSERT INTO role_page_grants (role_id, page_id, permission, is_granted, created_at) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(role_id)
        .bind(grant.page_id)
        .bind(grant.permission.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn reject_admin_role(role_id: i64) -> AppResult<()> {
    if role_id == ADMIN_ROLE_ID {
        return Err(AppError::bad_request(
            "the admin role is granted implicitly and carries no editable grants",
        ));
    }
    Ok(())
}

async fn active_catalog_pairs(pool: &SqlitePool) -> AppResult<HashSet<(Uuid, PermissionAction)>> {
    let rows = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT pp.page_id, pp.permission
        FROM page_permissions pp
        INNER JOIN pages p ON p.id = pp.page_id
        WHERE p.is_active = 1
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut pairs = HashSet::with_capacity(rows.len());
    for (page_id, permission) in rows {
        let permission = PermissionAction::parse(&permission)
            .ok_or_else(|| AppError::internal(format!("unknown permission type in store: {permission}")))?;
        pairs.insert((page_id, permission));
    }

    Ok(pairs)
}
