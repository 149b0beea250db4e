use crate::model::{InstanceRecord, InstanceStatus};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

const INSTANCE_COLUMNS: &str = "user_id, instance_name, instance_id, status, owner, profile_name, \
     profile_picture_url, integration, created_at, updated_at, connected_at, disconnected_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory pool; every extra connection would see its own
/// empty database.
pub async fn memory_pool() -> Result<Pool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // sqlx creates the file only when asked to.
    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn row_to_record(row: &SqliteRow) -> Result<InstanceRecord> {
    let status_str: String = row.get("status");
    let status = InstanceStatus::parse_status(&status_str)
        .ok_or_else(|| anyhow!("instance has unknown status {}", status_str))?;
    Ok(InstanceRecord {
        user_id: row.get("user_id"),
        instance_name: row.get("instance_name"),
        instance_id: row.try_get::<Option<String>, _>("instance_id")?,
        status,
        owner: row.try_get::<Option<String>, _>("owner")?,
        profile_name: row.try_get::<Option<String>, _>("profile_name")?,
        profile_picture_url: row.try_get::<Option<String>, _>("profile_picture_url")?,
        integration: row.get("integration"),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        connected_at: row.try_get::<Option<DateTime<Utc>>, _>("connected_at")?,
        disconnected_at: row.try_get::<Option<DateTime<Utc>>, _>("disconnected_at")?,
    })
}

/// All instances owned by `user_id`, newest first.
#[instrument(skip_all)]
pub async fn list_instances(pool: &Pool, user_id: &str) -> Result<Vec<InstanceRecord>> {
    let sql = format!(
        "SELECT {} FROM instances WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        INSTANCE_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    rows.iter().map(row_to_record).collect()
}

#[instrument(skip_all)]
pub async fn list_instance_names(pool: &Pool, user_id: &str) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT instance_name FROM instances WHERE user_id = ? ORDER BY instance_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}

#[instrument(skip_all)]
pub async fn find_instance(
    pool: &Pool,
    user_id: &str,
    instance_name: &str,
) -> Result<Option<InstanceRecord>> {
    let sql = format!(
        "SELECT {} FROM instances WHERE user_id = ? AND instance_name = ?",
        INSTANCE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(instance_name)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Insert or overwrite the row for `(user_id, instance_name)`. `created_at` is
/// kept from the existing row on conflict.
#[instrument(skip_all)]
pub async fn upsert_instance(pool: &Pool, record: &InstanceRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO instances (user_id, instance_name, instance_id, status, owner, profile_name, \
            profile_picture_url, integration, created_at, updated_at, connected_at, disconnected_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, instance_name) DO UPDATE SET \
            instance_id = excluded.instance_id, \
            status = excluded.status, \
            owner = excluded.owner, \
            profile_name = excluded.profile_name, \
            profile_picture_url = excluded.profile_picture_url, \
            integration = excluded.integration, \
            updated_at = excluded.updated_at, \
            connected_at = excluded.connected_at, \
            disconnected_at = excluded.disconnected_at",
    )
    .bind(&record.user_id)
    .bind(&record.instance_name)
    .bind(&record.instance_id)
    .bind(record.status.as_str())
    .bind(&record.owner)
    .bind(&record.profile_name)
    .bind(&record.profile_picture_url)
    .bind(&record.integration)
    .bind(record.created_at)
    .bind(record.updated_at)
    .bind(record.connected_at)
    .bind(record.disconnected_at)
    .execute(pool)
    .await
    .with_context(|| format!("failed to persist instance {}", record.instance_name))?;
    Ok(())
}

/// Returns whether a row was removed.
#[instrument(skip_all)]
pub async fn delete_instance(pool: &Pool, user_id: &str, instance_name: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM instances WHERE user_id = ? AND instance_name = ?")
        .bind(user_id)
        .bind(instance_name)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete instance {}", instance_name))?;
    Ok(res.rows_affected() > 0)
}
