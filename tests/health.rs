use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`

use estate_office::create_app;

#[tokio::test]
async fn health_reports_db_ok() -> Result<()> {
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

    let req = Request::builder().method("GET").uri("/api/health").body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body_bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let health: serde_json::Value = serde_json::from_slice(&body_bytes)?;
    assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(health.get("db_ok").and_then(|v| v.as_bool()), Some(true));

    Ok(())
}
