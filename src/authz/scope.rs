//! Ownership scope resolution for ownership-restricted roles.
//!
//! The resolver answers with sets of entity identifiers, never with query
//! fragments; each business-entity query intersects its own results against
//! the set it is handed. An identity with no assignments resolves to an
//! empty set: a legitimate outcome, not an error and never a
//! "show everything" fallback.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;

/// Visibility filter for an owner viewing tenants. A tenant is visible if
/// its current apartment's building is assigned to the owner OR the tenant
/// is directly linked to the owner. The union of both memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantFilter {
    pub building_ids: HashSet<Uuid>,
    pub tenant_ids: HashSet<Uuid>,
}

impl TenantFilter {
    pub fn permits(&self, tenant_id: Uuid, building_id: Option<Uuid>) -> bool {
        self.tenant_ids.contains(&tenant_id)
            || building_id.is_some_and(|building| self.building_ids.contains(&building))
    }

    pub fn is_empty(&self) -> bool {
        self.building_ids.is_empty() && self.tenant_ids.is_empty()
    }
}

/// Source of ownership scopes. The gate depends on this seam rather than on
/// the sqlx implementation so tests can substitute fixed assignments.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    async fn owner_buildings(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>>;

    async fn owner_villas(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>>;

    async fn tenant_filter(&self, user_id: Uuid) -> AppResult<TenantFilter>;
}

/// Reads the assignment-edge tables fresh on every call. Nothing is cached
/// between requests, so a revoked assignment takes effect immediately.
#[derive(Clone)]
pub struct AssignmentScopeResolver {
    pool: SqlitePool,
}

impl AssignmentScopeResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn edge_set(&self, sql: &str, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(sql).bind(user_id).fetch_all(&self.pool).await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl ScopeResolver for AssignmentScopeResolver {
    async fn owner_buildings(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        self.edge_set("SELECT building_id FROM owner_buildings WHERE owner_id = ?", user_id)
            .await
    }

    async fn owner_villas(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        self.edge_set("SELECT villa_id FROM owner_villas WHERE owner_id = ?", user_id)
            .await
    }

    async fn tenant_filter(&self, user_id: Uuid) -> AppResult<TenantFilter> {
        let building_ids = self.owner_buildings(user_id).await?;
        let tenant_ids = self
            .edge_set("SELECT tenant_id FROM owner_tenants WHERE owner_id = ?", user_id)
            .await?;

        Ok(TenantFilter {
            building_ids,
            tenant_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(buildings: &[Uuid], tenants: &[Uuid]) -> TenantFilter {
        TenantFilter {
            building_ids: buildings.iter().copied().collect(),
            tenant_ids: tenants.iter().copied().collect(),
        }
    }

    #[test]
    fn tenant_visible_through_building_membership() {
        let building = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let filter = filter_with(&[building], &[]);

        assert!(filter.permits(tenant, Some(building)));
        assert!(!filter.permits(tenant, Some(Uuid::new_v4())));
        assert!(!filter.permits(tenant, None));
    }

    #[test]
    fn tenant_visible_through_direct_link_regardless_of_building() {
        let tenant = Uuid::new_v4();
        let filter = filter_with(&[], &[tenant]);

        assert!(filter.permits(tenant, None));
        assert!(filter.permits(tenant, Some(Uuid::new_v4())));
    }

    #[test]
    fn either_membership_suffices() {
        let building = Uuid::new_v4();
        let linked = Uuid::new_v4();
        let filter = filter_with(&[building], &[linked]);

        // Union, not intersection: one side matching is enough.
        assert!(filter.permits(Uuid::new_v4(), Some(building)));
        assert!(filter.permits(linked, Some(Uuid::new_v4())));
        assert!(!filter.permits(Uuid::new_v4(), Some(Uuid::new_v4())));
    }

    #[test]
    fn empty_filter_permits_nothing() {
        let filter = TenantFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.permits(Uuid::new_v4(), Some(Uuid::new_v4())));
    }
}
