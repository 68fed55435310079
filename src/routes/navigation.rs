//! Endpoints every authenticated identity may call: the caller's own
//! sidebar and single permission checks.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::authz::resolver;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::grants::{PermissionAction, PermissionCheck};
use crate::models::page::Page;
use crate::models::response::ApiResponse;

/// Pages visible to the caller, in sidebar order
#[utoipa::path(
    get,
    path = "/navigation",
    tag = "Navigation",
    responses((status = 200, description = "Pages visible to the caller, inside the standard envelope", body = [Page])),
    security(("bearerAuth" = []))
)]
pub async fn navigation(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Page>>>> {
    let pages = resolver::visible_pages(&state.pool, &auth).await?;
    Ok(Json(ApiResponse::new(pages)))
}

#[derive(Debug, Deserialize)]
pub struct PermissionCheckQuery {
    pub page_url: String,
    pub permission: Option<PermissionAction>,
}

/// Check one (page, permission) pair for the caller. Unknown pages answer
/// `has_permission: false` with a 200; they are merely inaccessible.
#[utoipa::path(
    get,
    path = "/permissions/check",
    tag = "Navigation",
    params(
        ("page_url" = String, Query, description = "Page url to check"),
        ("permission" = Option<String>, Query, description = "Permission type, defaults to view"),
    ),
    responses((status = 200, description = "Check result, inside the standard envelope", body = PermissionCheck)),
    security(("bearerAuth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PermissionCheckQuery>,
) -> AppResult<Json<ApiResponse<PermissionCheck>>> {
    let action = query.permission.unwrap_or(PermissionAction::View);
    let decision = resolver::check(&state.pool, &auth, &query.page_url, action).await?;

    Ok(Json(ApiResponse::new(PermissionCheck {
        has_permission: decision.is_allowed(),
        page_url: query.page_url,
        permission_type: action,
    })))
}
