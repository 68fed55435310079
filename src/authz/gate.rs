//! The request authorization gate: the one contract controllers call before
//! touching business data.

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::resolver;
use crate::authz::scope::{AssignmentScopeResolver, ScopeResolver, TenantFilter};
use crate::authz::Decision;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::grants::PermissionAction;

/// Caller-supplied hint: is the requested resource ownership-restricted for
/// this identity? The caller knows its own permission shape; the gate does
/// not re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    /// No per-entity restriction beyond the page permission.
    None,
    OwnerBuildings,
    OwnerVillas,
    OwnerTenants,
}

/// Identifier sets a scoped request may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Buildings(HashSet<Uuid>),
    Villas(HashSet<Uuid>),
    Tenants(TenantFilter),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No row-level restriction: superuser, or a resource without ownership
    /// scoping.
    Unrestricted,
    /// Restricted to the resolved identifier sets. An empty set is a valid
    /// state (the caller returns an empty list), not a denial.
    Scoped(ScopeFilter),
}

/// The typed authorization result handed to downstream query code. Produced
/// once per request by [`authorize`]; nothing is smuggled through request
/// extensions.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub user_id: Uuid,
    pub role_id: i64,
    pub access: Access,
}

impl AuthorizationContext {
    /// Single-entity membership check for get/update/delete-by-id flows.
    /// Callers fetch the entity first (absent -> not found), then verify
    /// membership here, so existence and permission failures stay distinct.
    pub fn ensure_building(&self, building_id: Uuid) -> AppResult<()> {
        match &self.access {
            Access::Unrestricted => Ok(()),
            Access::Scoped(ScopeFilter::Buildings(ids)) if ids.contains(&building_id) => Ok(()),
            _ => Err(AppError::forbidden("building is outside your assigned scope")),
        }
    }

    pub fn ensure_villa(&self, villa_id: Uuid) -> AppResult<()> {
        match &self.access {
            Access::Unrestricted => Ok(()),
            Access::Scoped(ScopeFilter::Villas(ids)) if ids.contains(&villa_id) => Ok(()),
            _ => Err(AppError::forbidden("villa is outside your assigned scope")),
        }
    }

    pub fn ensure_tenant(&self, tenant_id: Uuid, building_id: Option<Uuid>) -> AppResult<()> {
        match &self.access {
            Access::Unrestricted => Ok(()),
            Access::Scoped(ScopeFilter::Tenants(filter)) if filter.permits(tenant_id, building_id) => Ok(()),
            _ => Err(AppError::forbidden("tenant is outside your assigned scope")),
        }
    }
}

/// Gate a request: superuser bypass, then the page permission, then, for
/// ownership-scoped resources, the resolved assignment scope. Any store
/// failure propagates as an error, never as an allow.
pub async fn authorize(
    pool: &SqlitePool,
    auth: &AuthUser,
    page_url: &str,
    action: PermissionAction,
    scope: ResourceScope,
) -> AppResult<AuthorizationContext> {
    let scopes = AssignmentScopeResolver::new(pool.clone());
    authorize_with(pool, &scopes, auth, page_url, action, scope).await
}

/// Same as [`authorize`] with an explicit scope source, the seam used by
/// tests.
pub async fn authorize_with(
    pool: &SqlitePool,
    scopes: &dyn ScopeResolver,
    auth: &AuthUser,
    page_url: &str,
    action: PermissionAction,
    scope: ResourceScope,
) -> AppResult<AuthorizationContext> {
    if auth.is_superuser {
        return Ok(AuthorizationContext {
            user_id: auth.user_id,
            role_id: auth.role_id,
            access: Access::Unrestricted,
        });
    }

    let decision = resolver::check(pool, auth, page_url, action).await?;
    if let Decision::Deny(_) = decision {
        tracing::debug!(
            user_id = %auth.user_id,
            role_id = auth.role_id,
            page_url,
            action = %action,
            reason = decision.reason(),
            "request denied"
        );
        return Err(AppError::forbidden("insufficient permission"));
    }

    let access = match scope {
        ResourceScope::None => Access::Unrestricted,
        ResourceScope::OwnerBuildings => {
            Access::Scoped(ScopeFilter::Buildings(scopes.owner_buildings(auth.user_id).await?))
        }
        ResourceScope::OwnerVillas => {
            Access::Scoped(ScopeFilter::Villas(scopes.owner_villas(auth.user_id).await?))
        }
        ResourceScope::OwnerTenants => {
            Access::Scoped(ScopeFilter::Tenants(scopes.tenant_filter(auth.user_id).await?))
        }
    };

    Ok(AuthorizationContext {
        user_id: auth.user_id,
        role_id: auth.role_id,
        access,
    })
}
