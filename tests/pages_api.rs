//! Page management endpoints: lifecycle, guards, soft deletion.

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use estate_office::create_app;
use estate_office::jwt::JwtConfig;

async fn setup() -> Result<(SqlitePool, Router, tempfile::TempDir)> {
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

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((pool, app, dir))
}

fn token_for(role_id: i64) -> Result<String> {
    let jwt = JwtConfig { secret: std::sync::Arc::new(b"test-secret".to_vec()), exp_hours: 24 };
    Ok(jwt.encode(Uuid::new_v4(), role_id)?)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn page_lifecycle() -> Result<()> {
    let (pool, app, _dir) = setup().await?;
    let admin = token_for(1)?;

    // Create with an explicit permission set.
    let (status, created) = request(
        &app,
        "POST",
        "/admin/pages",
        Some(&admin),
        Some(json!({
            "name": "Contracts",
            "url": "/contracts",
            "icon": "file-signature",
            "display_order": 3,
            "permissions": ["view", "create", "update", "delete"]
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {created}");
    assert_eq!(created.get("success"), Some(&Value::Bool(true)));
    let page_id = created
        .pointer("/data/id")
        .and_then(|v| v.as_str())
        .context("missing page id")?
        .to_string();

    // Duplicate url conflicts.
    let (status, _) = request(
        &app,
        "POST",
        "/admin/pages",
        Some(&admin),
        Some(json!({ "name": "Contracts copy", "url": "/contracts" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // The catalog groups the page with its four permission types.
    let (status, catalog) = request(&app, "GET", "/admin/pages/catalog", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    let entries = catalog.pointer("/data").and_then(|v| v.as_array()).context("missing data")?;
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].pointer("/permissions").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(4)
    );

    // Update metadata.
    let (status, updated) = request(
        &app,
        "PUT",
        &format!("/admin/pages/{page_id}"),
        Some(&admin),
        Some(json!({ "name": "Lease Contracts" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated.pointer("/data/name").and_then(|v| v.as_str()), Some("Lease Contracts"));

    // Grant a role something on the page, then deactivate it.
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/admin/roles/5/pages/{page_id}/grants"),
        Some(&admin),
        Some(json!({ "grants": [ { "permission": "view", "is_granted": true } ] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "DELETE", &format!("/admin/pages/{page_id}"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deactivated pages disappear from navigation...
    let (status, nav) = request(&app, "GET", "/navigation", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(nav.pointer("/data").and_then(|v| v.as_array()).map(|a| a.len()), Some(0));

    // ...but their grant rows survive.
    let grant_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM role_page_grants WHERE role_id = 5")
        .fetch_one(&pool)
        .await?;
    assert_eq!(grant_count, 1);

    // A second delete is a 404: the page no longer resolves.
    let (status, _) = request(&app, "DELETE", &format!("/admin/pages/{page_id}"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn management_endpoints_are_guarded() -> Result<()> {
    let (_pool, app, _dir) = setup().await?;
    let admin = token_for(1)?;
    let owner = token_for(5)?;

    let (status, _) = request(
        &app,
        "POST",
        "/admin/pages",
        Some(&admin),
        Some(json!({ "name": "Role Permissions", "url": "/role-permissions" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    // No grants: every management call is forbidden for the owner role.
    let (status, _) = request(&app, "GET", "/admin/pages", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        "POST",
        "/admin/pages",
        Some(&owner),
        Some(json!({ "name": "Sneaky", "url": "/sneaky" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn update_of_missing_page_is_not_found() -> Result<()> {
    let (_pool, app, _dir) = setup().await?;
    let admin = token_for(1)?;

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/admin/pages/{}", Uuid::new_v4()),
        Some(&admin),
        Some(json!({ "name": "Ghost" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("error").and_then(|v| v.as_str()), Some("not_found"));

    Ok(())
}

#[tokio::test]
async fn page_without_permission_types_is_rejected() -> Result<()> {
    let (_pool, app, _dir) = setup().await?;
    let admin = token_for(1)?;

    let (status, _) = request(
        &app,
        "POST",
        "/admin/pages",
        Some(&admin),
        Some(json!({ "name": "Empty", "url": "/empty", "permissions": [] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
