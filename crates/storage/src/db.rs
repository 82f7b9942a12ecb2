use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

/// A persisted bill. Rows are append-only: created once per successful
/// extraction, never updated or deleted by the application.
#[derive(Debug, Clone)]
pub struct BillRecord {
    pub id: i64,
    pub raw_text: String,
    /// Reserved for structured extraction; never populated by the OCR path.
    pub total_amount: Option<f64>,
    pub tax: Option<f64>,
    pub other_charges: Option<f64>,
    pub created_at: String,
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_text TEXT NOT NULL,
            total_amount REAL,
            tax REAL,
            other_charges REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append a bill row and read it back with its assigned id.
pub async fn insert_bill(
    pool: &DbPool,
    raw_text: &str,
    total_amount: Option<f64>,
    tax: Option<f64>,
    other_charges: Option<f64>,
) -> Result<BillRecord, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO bills (raw_text, total_amount, tax, other_charges) VALUES (?, ?, ?, ?)",
    )
    .bind(raw_text)
    .bind(total_amount)
    .bind(tax)
    .bind(other_charges)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    let bill = get_bill_by_id(pool, id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(bill)
}

pub async fn get_bill_by_id(pool: &DbPool, id: i64) -> Result<Option<BillRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, String, Option<f64>, Option<f64>, Option<f64>, String)>(
        "SELECT id, raw_text, total_amount, tax, other_charges, created_at FROM bills WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| BillRecord {
        id: r.0,
        raw_text: r.1,
        total_amount: r.2,
        tax: r.3,
        other_charges: r.4,
        created_at: r.5,
    }))
}

/// Total number of bill rows. Used by tests and operational checks.
pub async fn count_bills(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM bills")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
