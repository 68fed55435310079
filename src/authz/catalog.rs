//! Permission catalog reads: which pages exist and which permission types
//! each page supports.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::grants::PermissionAction;
use crate::models::page::{DbPage, Page, PageWithPermissions};

/// Active pages in sidebar order.
pub async fn list_active_pages(pool: &SqlitePool) -> AppResult<Vec<Page>> {
    let pages = sqlx::query_as::<_, DbPage>(
        "SELECT id, name, url, icon, display_order, description, is_active, created_at, updated_at FROM pages WHERE is_active = 1 ORDER BY display_order, name",
    )
    .fetch_all(pool)
    .await?;

    pages.into_iter().map(Page::try_from).collect()
}

/// Every page (active and deactivated) for the management view.
pub async fn list_all_pages(pool: &SqlitePool) -> AppResult<Vec<Page>> {
    let pages = sqlx::query_as::<_, DbPage>(
        "SELECT id, name, url, icon, display_order, description, is_active, created_at, updated_at FROM pages ORDER BY display_order, name",
    )
    .fetch_all(pool)
    .await?;

    pages.into_iter().map(Page::try_from).collect()
}

pub async fn find_active_page_by_url(pool: &SqlitePool, url: &str) -> AppResult<Option<Page>> {
    let page = sqlx::query_as::<_, DbPage>(
        "SELECT id, name, url, icon, display_order, description, is_active, created_at, updated_at FROM pages WHERE url = ? AND is_active = 1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    page.map(Page::try_from).transpose()
}

/// Deactivated pages read as absent here, same as pages that never existed.
pub async fn fetch_active_page(pool: &SqlitePool, page_id: Uuid) -> AppResult<Page> {
    sqlx::query_as::<_, DbPage>(
        "SELECT id, name, url, icon, display_order, description, is_active, created_at, updated_at FROM pages WHERE id = ? AND is_active = 1",
    )
    .bind(page_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("page not found"))?
    .try_into()
}

/// Permission types a page supports, in stable order.
pub async fn supported_permissions(pool: &SqlitePool, page_id: Uuid) -> AppResult<Vec<PermissionAction>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT permission FROM page_permissions WHERE page_id = ? ORDER BY permission")
            .bind(page_id)
            .fetch_all(pool)
            .await?;

    names
        .iter()
        .map(|name| {
            PermissionAction::parse(name)
                .ok_or_else(|| AppError::internal(format!("unknown permission type in store: {name}")))
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct DbPagePermission {
    page_id: Uuid,
    permission: String,
}

/// Active pages each with their full permission set, grouped by page. The
/// underlying join yields one row per (page, permission); grouping happens
/// here so no consumer ever sees a page duplicated.
pub async fn list_pages_with_permissions(pool: &SqlitePool) -> AppResult<Vec<PageWithPermissions>> {
    let pages = list_active_pages(pool).await?;

    let rows = sqlx::query_as::<_, DbPagePermission>(
        r#"
        SELECT pp.page_id, pp.permission
        FROM page_permissions pp
        INNER JOIN pages p ON p.id = pp.page_id
        WHERE p.is_active = 1
        ORDER BY pp.permission
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut by_page: std::collections::HashMap<Uuid, Vec<PermissionAction>> = std::collections::HashMap::new();
    for row in rows {
        let permission = PermissionAction::parse(&row.permission)
            .ok_or_else(|| AppError::internal(format!("unknown permission type in store: {}", row.permission)))?;
        by_page.entry(row.page_id).or_default().push(permission);
    }

    Ok(pages
        .into_iter()
        .map(|page| {
            let permissions = by_page.remove(&page.id).unwrap_or_default();
            PageWithPermissions { page, permissions }
        })
        .collect())
}
