//! Page management endpoints. Pages are deactivated rather than deleted so
//! historical grant rows stay referentially valid.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, catalog, well_known, ResourceScope};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::grants::PermissionAction;
use crate::models::page::{Page, PageCreateRequest, PageUpdateRequest, PageWithPermissions};
use crate::models::response::ApiResponse;
use crate::utils::utc_now;

/// All pages, deactivated ones included (management view)
#[utoipa::path(
    get,
    path = "/admin/pages",
    tag = "Pages",
    responses(
        (status = 200, description = "All pages, inside the standard envelope", body = [Page]),
        (status = 403, description = "Missing view permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_pages(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Page>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::View,
        ResourceScope::None,
    )
    .await?;

    let pages = catalog::list_all_pages(&state.pool).await?;
    Ok(Json(ApiResponse::new(pages)))
}

/// Active pages with the permission types each supports
#[utoipa::path(
    get,
    path = "/admin/pages/catalog",
    tag = "Pages",
    responses(
        (status = 200, description = "Pages with their permission catalog, inside the standard envelope", body = [PageWithPermissions]),
        (status = 403, description = "Missing view permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn page_catalog(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<PageWithPermissions>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::View,
        ResourceScope::None,
    )
    .await?;

    let entries = catalog::list_pages_with_permissions(&state.pool).await?;
    Ok(Json(ApiResponse::new(entries)))
}

/// Create a page together with its supported permission set
#[utoipa::path(
    post,
    path = "/admin/pages",
    tag = "Pages",
    request_body = PageCreateRequest,
    responses(
        (status = 201, description = "Page created, inside the standard envelope", body = Page),
        (status = 409, description = "Page url already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_page(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<PageCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Page>>)> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::Create,
        ResourceScope::None,
    )
    .await?;

    let mut permissions = payload.permissions.unwrap_or_else(|| PermissionAction::ALL.to_vec());
    let mut seen = std::collections::HashSet::new();
    permissions.retain(|permission| seen.insert(*permission));
    if permissions.is_empty() {
        return Err(AppError::bad_request("a page must support at least one permission type"));
    }

    let page_id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO pages (id, name, url, icon, display_order, description, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(page_id)
    .bind(&payload.name)
    .bind(&payload.url)
    .bind(&payload.icon)
    .bind(payload.display_order.unwrap_or(0))
    .bind(&payload.description)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::conflict("a page with this url already exists");
            }
        }
        e.into()
    })?;

    for permission in &permissions {
        sqlx::query("INSERT INTO page_permissions (page_id, permission, created_at) VALUES (?, ?, ?)")
            .bind(page_id)
            .bind(permission.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let page = catalog::fetch_active_page(&state.pool, page_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &page,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::new(page))))
}

/// Update a page's metadata
#[utoipa::path(
    put,
    path = "/admin/pages/{id}",
    tag = "Pages",
    params(("id" = Uuid, Path, description = "Page id")),
    request_body = PageUpdateRequest,
    responses(
        (status = 200, description = "Page updated, inside the standard envelope", body = Page),
        (status = 404, description = "Page not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_page(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageUpdateRequest>,
) -> AppResult<Json<ApiResponse<Page>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::Update,
        ResourceScope::None,
    )
    .await?;

    let before = catalog::fetch_active_page(&state.pool, id).await?;
    let mut page = before.clone();

    if let Some(name) = payload.name.as_ref() {
        page.name = name.clone();
    }
    if let Some(url) = payload.url.as_ref() {
        page.url = url.clone();
    }
    if payload.icon.is_some() {
        page.icon = payload.icon.clone();
    }
    if let Some(display_order) = payload.display_order {
        page.display_order = display_order;
    }
    if payload.description.is_some() {
        page.description = payload.description.clone();
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE pages SET name = ?, url = ?, icon = ?, display_order = ?, description = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&page.name)
    .bind(&page.url)
    .bind(&page.icon)
    .bind(page.display_order)
    .bind(&page.description)
    .bind(now)
    .bind(page.id)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::conflict("a page with this url already exists");
            }
        }
        e.into()
    })?;

    page.updated_at = now;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &page,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::new(page)))
}

/// Deactivate a page. Grant rows referencing it are kept; the page simply
/// stops resolving for navigation and checks.
#[utoipa::path(
    delete,
    path = "/admin/pages/{id}",
    tag = "Pages",
    params(("id" = Uuid, Path, description = "Page id")),
    responses(
        (status = 204, description = "Page deactivated"),
        (status = 404, description = "Page not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_page(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::Delete,
        ResourceScope::None,
    )
    .await?;

    let page = catalog::fetch_active_page(&state.pool, id).await?;

    let now = utc_now();
    let affected = sqlx::query("UPDATE pages SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1")
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("page not found"));
    }

    log_activity_with_context(
        &state.event_bus,
        "deactivated",
        Some(auth.user_id),
        &page,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
