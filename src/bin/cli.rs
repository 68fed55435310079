use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use estate_office::models::grants::PermissionAction;

#[derive(Parser, Debug)]
#[command(author, version, about = "estate-office maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Install the standard back-office page catalog (idempotent)
    SeedCatalog,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may
    // differ, so fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::SeedCatalog => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            let installed = seed_catalog(&pool).await?;
            println!("Catalog seeded ({installed} new pages)");
        }
    }

    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table_exists =
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if table_exists.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if !desc.is_empty() { desc } else { "unknown" };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

struct SeedPage {
    name: &'static str,
    url: &'static str,
    icon: &'static str,
    description: &'static str,
    permissions: &'static [PermissionAction],
}

const FULL: &[PermissionAction] = &[
    PermissionAction::View,
    PermissionAction::Create,
    PermissionAction::Update,
    PermissionAction::Delete,
    PermissionAction::Assign,
];

const CRUD: &[PermissionAction] = &[
    PermissionAction::View,
    PermissionAction::Create,
    PermissionAction::Update,
    PermissionAction::Delete,
];

const SEED_PAGES: &[SeedPage] = &[
    SeedPage { name: "Dashboard", url: "/dashboard", icon: "gauge", description: "Portfolio overview", permissions: &[PermissionAction::View] },
    SeedPage { name: "Buildings", url: "/buildings", icon: "building", description: "Building portfolio", permissions: FULL },
    SeedPage { name: "Apartments", url: "/apartments", icon: "door", description: "Apartments per building", permissions: FULL },
    SeedPage { name: "Villas", url: "/villas", icon: "home", description: "Stand-alone villas", permissions: FULL },
    SeedPage { name: "Owners", url: "/owners", icon: "user-tie", description: "Property owners and their assignments", permissions: FULL },
    SeedPage { name: "Tenants", url: "/tenants", icon: "users", description: "Tenants and their units", permissions: FULL },
    SeedPage { name: "Contracts", url: "/contracts", icon: "file-signature", description: "Lease contracts", permissions: CRUD },
    SeedPage { name: "Transactions", url: "/transactions", icon: "coins", description: "Payments and charges", permissions: CRUD },
    SeedPage { name: "Role Permissions", url: "/role-permissions", icon: "shield", description: "Role and permission management", permissions: FULL },
];

/// Insert any standard page missing from the catalog; existing pages are
/// left untouched.
async fn seed_catalog(pool: &SqlitePool) -> anyhow::Result<usize> {
    let mut installed = 0usize;

    for (order, seed) in SEED_PAGES.iter().enumerate() {
        let existing = sqlx::query("SELECT id FROM pages WHERE url = ?")
            .bind(seed.url)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            continue;
        }

        let page_id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO pages (id, name, url, icon, display_order, description, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(page_id)
        .bind(seed.name)
        .bind(seed.url)
        .bind(seed.icon)
        .bind(order as i64)
        .bind(seed.description)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for permission in seed.permissions {
            sqlx::query("INSERT INTO page_permissions (page_id, permission, created_at) VALUES (?, ?, ?)")
                .bind(page_id)
                .bind(permission.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        installed += 1;
    }

    Ok(installed)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root); fall back
    // to the crate-local folder when the CWD differs (containers).
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
