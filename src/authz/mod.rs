//! Authorization core: permission catalog, role grant matrix, effective
//! permission resolution, ownership scoping, and the request gate that
//! composes them.
//!
//! Everything here is request-scoped and memoryless: each check reads the
//! catalog, matrix, and assignment edges fresh, so a committed grant change
//! or revoked assignment is effective on the very next request. Every store
//! failure propagates as an error; there is no path from a failed read to an
//! allow.

pub mod catalog;
mod decision;
pub mod gate;
pub mod grants;
pub mod resolver;
pub mod scope;

pub use decision::{AllowReason, Decision, DenyReason};
pub use gate::{authorize, authorize_with, Access, AuthorizationContext, ResourceScope, ScopeFilter};
pub use scope::{AssignmentScopeResolver, ScopeResolver, TenantFilter};

/// Reserved role id of the administrator class. Identities with this role
/// bypass the grant matrix entirely; the comparison happens once, when the
/// identity is loaded (`AuthUser::new`), never inline at call sites.
pub const ADMIN_ROLE_ID: i64 = 1;

/// Well-known page URLs the core itself is guarded by.
pub mod well_known {
    /// The role-permissions management page; the grant and page-management
    /// endpoints check their actions against this page.
    pub const ROLE_PERMISSIONS_PAGE: &str = "/role-permissions";
}
