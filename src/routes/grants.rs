//! Role grant endpoints. Grants are never toggled one by one: a role's
//! grant set for one page, or for all pages, is replaced atomically. Every
//! replacement is logged with Critical severity.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, grants, resolver, well_known, ResourceScope};
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::grants::{
    GrantReplacement, PermissionAction, ReplacePageGrantsRequest, ReplaceRoleGrantsRequest, RoleGrantRow,
    RolePageGrants,
};
use crate::models::response::ApiResponse;
use crate::utils::decode_payload;

/// One role's grants across the whole active catalog. Every (page,
/// permission) pair appears; ungranted pairs read `is_granted: false`.
#[utoipa::path(
    get,
    path = "/admin/roles/{role_id}/grants",
    tag = "Grants",
    params(("role_id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Full grant matrix for the role, inside the standard envelope", body = [RoleGrantRow]),
        (status = 403, description = "Missing view permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role_grants(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<RoleGrantRow>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::View,
        ResourceScope::None,
    )
    .await?;

    let rows = grants::grants_for_role(&state.pool, role_id).await?;
    Ok(Json(ApiResponse::new(rows)))
}

/// The role-editor matrix: pages grouped with the grant state of each
/// supported permission type.
#[utoipa::path(
    get,
    path = "/admin/roles/{role_id}/matrix",
    tag = "Grants",
    params(("role_id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Grouped grant matrix, inside the standard envelope", body = [RolePageGrants]),
        (status = 403, description = "Missing view permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role_matrix(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role_id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<RolePageGrants>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::View,
        ResourceScope::None,
    )
    .await?;

    let matrix = resolver::role_matrix(&state.pool, role_id).await?;
    Ok(Json(ApiResponse::new(matrix)))
}

/// Atomically replace a role's entire grant set. Only granted pairs are
/// submitted; everything else becomes deny.
#[utoipa::path(
    put,
    path = "/admin/roles/{role_id}/grants",
    tag = "Grants",
    params(("role_id" = i64, Path, description = "Role id")),
    request_body = ReplaceRoleGrantsRequest,
    responses(
        (status = 200, description = "Replaced; returns the refreshed matrix, inside the standard envelope", body = [RoleGrantRow]),
        (status = 400, description = "Malformed or unknown grant entries"),
        (status = 403, description = "Missing assign permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn replace_role_grants(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(role_id): Path<i64>,
    Json(raw): Json<serde_json::Value>,
) -> AppResult<Json<ApiResponse<Vec<RoleGrantRow>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::Assign,
        ResourceScope::None,
    )
    .await?;

    let payload: ReplaceRoleGrantsRequest = decode_payload(raw)?;
    grants::replace_role_grants(&state.pool, role_id, &payload.permissions).await?;

    let replacement = GrantReplacement {
        role_id,
        page_id: None,
        granted: payload.permissions.len(),
    };
    log_activity_with_context(
        &state.event_bus,
        "replaced",
        Some(auth.user_id),
        &replacement,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let rows = grants::grants_for_role(&state.pool, role_id).await?;
    Ok(Json(ApiResponse::with_message(rows, "grants replaced")))
}

/// Atomically replace a role's grants for a single page. Entries are stored
/// verbatim, explicit `is_granted: false` included.
#[utoipa::path(
    put,
    path = "/admin/roles/{role_id}/pages/{page_id}/grants",
    tag = "Grants",
    params(
        ("role_id" = i64, Path, description = "Role id"),
        ("page_id" = Uuid, Path, description = "Page id"),
    ),
    request_body = ReplacePageGrantsRequest,
    responses(
        (status = 200, description = "Replaced; returns the refreshed matrix, inside the standard envelope", body = [RoleGrantRow]),
        (status = 400, description = "Malformed or unsupported grant entries"),
        (status = 403, description = "Missing assign permission"),
        (status = 404, description = "Page not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn replace_page_grants(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((role_id, page_id)): Path<(i64, Uuid)>,
    Json(raw): Json<serde_json::Value>,
) -> AppResult<Json<ApiResponse<Vec<RoleGrantRow>>>> {
    authorize(
        &state.pool,
        &auth,
        well_known::ROLE_PERMISSIONS_PAGE,
        PermissionAction::Assign,
        ResourceScope::None,
    )
    .await?;

    let payload: ReplacePageGrantsRequest = decode_payload(raw)?;
    grants::replace_page_grants(&state.pool, role_id, page_id, &payload.grants).await?;

    let replacement = GrantReplacement {
        role_id,
        page_id: Some(page_id),
        granted: payload.grants.iter().filter(|entry| entry.is_granted).count(),
    };
    log_activity_with_context(
        &state.event_bus,
        "replaced",
        Some(auth.user_id),
        &replacement,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let rows = grants::grants_for_role(&state.pool, role_id).await?;
    Ok(Json(ApiResponse::with_message(rows, "grants replaced")))
}
