//! Ownership scope resolution and its composition with the gate.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use estate_office::authz::{
    authorize, authorize_with, grants, Access, AssignmentScopeResolver, ResourceScope, ScopeFilter,
    ScopeResolver, TenantFilter,
};
use estate_office::errors::{AppError, AppResult};
use estate_office::jwt::AuthUser;
use estate_office::models::grants::{GrantedPagePermission, PermissionAction};

const OWNER_ROLE: i64 = 5;

async fn setup_pool() -> Result<(SqlitePool, tempfile::TempDir)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

async fn grant_view(pool: &SqlitePool, url: &str) -> Result<()> {
    let page_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO pages (id, name, url, icon, display_order, description, is_active, created_at, updated_at) VALUES (?, ?, ?, NULL, 0, NULL, 1, ?, ?)",
    )
    .bind(page_id)
    .bind(url)
    .bind(url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    sqlx::query("INSERT INTO page_permissions (page_id, permission, created_at) VALUES (?, 'view', ?)")
        .bind(page_id)
        .bind(now)
        .execute(pool)
        .await?;

    grants::replace_role_grants(
        pool,
        OWNER_ROLE,
        &[GrantedPagePermission { page_id, permission: PermissionAction::View }],
    )
    .await?;
    Ok(())
}

async fn add_edge(pool: &SqlitePool, table: &str, owner_id: Uuid, entity_id: Uuid) -> Result<()> {
    let column = match table {
        "owner_buildings" => "building_id",
        "owner_villas" => "villa_id",
        "owner_tenants" => "tenant_id",
        other => anyhow::bail!("unknown edge table {other}"),
    };
    let sql = format!("INSERT INTO {table} (owner_id, {column}, created_at) VALUES (?, ?, ?)");
    sqlx::query(&sql)
        .bind(owner_id)
        .bind(entity_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

async fn remove_edge(pool: &SqlitePool, table: &str, owner_id: Uuid, entity_id: Uuid) -> Result<()> {
    let column = match table {
        "owner_buildings" => "building_id",
        "owner_villas" => "villa_id",
        "owner_tenants" => "tenant_id",
        other => anyhow::bail!("unknown edge table {other}"),
    };
    let sql = format!("DELETE FROM {table} WHERE owner_id = ? AND {column} = ?");
    sqlx::query(&sql)
        .bind(owner_id)
        .bind(entity_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn no_assignments_resolve_to_empty_sets() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let scopes = AssignmentScopeResolver::new(pool.clone());
    let owner_id = Uuid::new_v4();

    assert!(scopes.owner_buildings(owner_id).await?.is_empty());
    assert!(scopes.owner_villas(owner_id).await?.is_empty());
    assert!(scopes.tenant_filter(owner_id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn scope_grows_and_shrinks_with_edges() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let scopes = AssignmentScopeResolver::new(pool.clone());
    let owner_id = Uuid::new_v4();
    let building_a = Uuid::new_v4();
    let building_b = Uuid::new_v4();

    add_edge(&pool, "owner_buildings", owner_id, building_a).await?;
    let before = scopes.owner_buildings(owner_id).await?;

    add_edge(&pool, "owner_buildings", owner_id, building_b).await?;
    let grown = scopes.owner_buildings(owner_id).await?;
    assert!(grown.is_superset(&before));
    assert_eq!(grown.len(), 2);

    remove_edge(&pool, "owner_buildings", owner_id, building_a).await?;
    let shrunk = scopes.owner_buildings(owner_id).await?;
    assert!(shrunk.is_subset(&grown));
    assert_eq!(shrunk.len(), 1);
    assert!(shrunk.contains(&building_b));

    Ok(())
}

#[tokio::test]
async fn edges_are_read_fresh_per_resolution() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let scopes = AssignmentScopeResolver::new(pool.clone());
    let owner_id = Uuid::new_v4();
    let villa = Uuid::new_v4();

    assert!(scopes.owner_villas(owner_id).await?.is_empty());

    // A revoked assignment is gone on the very next resolution.
    add_edge(&pool, "owner_villas", owner_id, villa).await?;
    assert!(scopes.owner_villas(owner_id).await?.contains(&villa));
    remove_edge(&pool, "owner_villas", owner_id, villa).await?;
    assert!(scopes.owner_villas(owner_id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn tenant_filter_is_a_disjunction_of_memberships() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let scopes = AssignmentScopeResolver::new(pool.clone());
    let owner_id = Uuid::new_v4();
    let building = Uuid::new_v4();
    let linked_tenant = Uuid::new_v4();

    add_edge(&pool, "owner_buildings", owner_id, building).await?;
    add_edge(&pool, "owner_tenants", owner_id, linked_tenant).await?;

    let filter = scopes.tenant_filter(owner_id).await?;

    // Visible through the building, through the direct link, or not at all.
    assert!(filter.permits(Uuid::new_v4(), Some(building)));
    assert!(filter.permits(linked_tenant, Some(Uuid::new_v4())));
    assert!(filter.permits(linked_tenant, None));
    assert!(!filter.permits(Uuid::new_v4(), Some(Uuid::new_v4())));
    assert!(!filter.permits(Uuid::new_v4(), None));

    Ok(())
}

#[tokio::test]
async fn gate_attaches_scope_and_allows_empty_sets() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    grant_view(&pool, "/buildings").await?;
    let owner = AuthUser::new(Uuid::new_v4(), OWNER_ROLE);

    // No assignments: the request is still allowed, with an empty filter,
    // so list endpoints answer with an empty list rather than a 403.
    let ctx = authorize(&pool, &owner, "/buildings", PermissionAction::View, ResourceScope::OwnerBuildings)
        .await?;
    match &ctx.access {
        Access::Scoped(ScopeFilter::Buildings(ids)) => assert!(ids.is_empty()),
        other => panic!("expected an empty building scope, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn gate_denies_before_scope_resolution() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let owner = AuthUser::new(Uuid::new_v4(), OWNER_ROLE);
    add_edge(&pool, "owner_buildings", owner.user_id, Uuid::new_v4()).await?;

    // Assignments alone grant nothing; the page permission comes first.
    let err = authorize(&pool, &owner, "/buildings", PermissionAction::View, ResourceScope::OwnerBuildings)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn single_entity_check_distinguishes_member_from_outsider() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    grant_view(&pool, "/buildings").await?;
    let owner = AuthUser::new(Uuid::new_v4(), OWNER_ROLE);
    let assigned = Uuid::new_v4();
    let foreign = Uuid::new_v4();
    add_edge(&pool, "owner_buildings", owner.user_id, assigned).await?;

    let ctx = authorize(&pool, &owner, "/buildings", PermissionAction::View, ResourceScope::OwnerBuildings)
        .await?;

    ctx.ensure_building(assigned)?;

    // The foreign building exists for someone; for this owner it is
    // forbidden, distinct from not-found.
    let err = ctx.ensure_building(foreign).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Ok(())
}

#[tokio::test]
async fn superuser_is_never_scoped() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    let admin = AuthUser::new(Uuid::new_v4(), 1);

    let ctx = authorize(&pool, &admin, "/buildings", PermissionAction::Delete, ResourceScope::OwnerBuildings)
        .await?;
    assert_eq!(ctx.access, Access::Unrestricted);
    ctx.ensure_building(Uuid::new_v4())?;
    ctx.ensure_villa(Uuid::new_v4())?;
    ctx.ensure_tenant(Uuid::new_v4(), None)?;

    Ok(())
}

/// Fixed-assignment scope source, standing in for the sqlx-backed resolver.
struct FixedScopes {
    buildings: HashSet<Uuid>,
}

#[async_trait]
impl ScopeResolver for FixedScopes {
    async fn owner_buildings(&self, _user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        Ok(self.buildings.clone())
    }

    async fn owner_villas(&self, _user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        Ok(HashSet::new())
    }

    async fn tenant_filter(&self, _user_id: Uuid) -> AppResult<TenantFilter> {
        Ok(TenantFilter::default())
    }
}

#[tokio::test]
async fn gate_accepts_alternate_scope_sources() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    grant_view(&pool, "/buildings").await?;
    let owner = AuthUser::new(Uuid::new_v4(), OWNER_ROLE);
    let building = Uuid::new_v4();

    let scopes = FixedScopes { buildings: [building].into_iter().collect() };
    let ctx = authorize_with(
        &pool,
        &scopes,
        &owner,
        "/buildings",
        PermissionAction::View,
        ResourceScope::OwnerBuildings,
    )
    .await?;

    ctx.ensure_building(building)?;
    assert!(ctx.ensure_building(Uuid::new_v4()).is_err());

    Ok(())
}

#[tokio::test]
async fn mismatched_filter_kind_fails_closed() -> Result<()> {
    let (pool, _dir) = setup_pool().await?;
    grant_view(&pool, "/buildings").await?;
    let owner = AuthUser::new(Uuid::new_v4(), OWNER_ROLE);
    let building = Uuid::new_v4();
    add_edge(&pool, "owner_buildings", owner.user_id, building).await?;

    let ctx = authorize(&pool, &owner, "/buildings", PermissionAction::View, ResourceScope::OwnerBuildings)
        .await?;

    // A buildings filter says nothing about villas or tenants.
    assert!(ctx.ensure_villa(building).is_err());
    assert!(ctx.ensure_tenant(building, Some(building)).is_err());

    Ok(())
}
