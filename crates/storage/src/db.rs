use chrono::NaiveDate;
use peso_core::{Amount, TransactionKind, TransactionRecord};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT,
            source_row INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_setting(pool: &DbPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn put_setting(pool: &DbPool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts the whole batch in one SQL transaction. Either every record is
/// stored or none is.
pub async fn insert_transactions(
    pool: &DbPool,
    records: &[TransactionRecord],
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            "INSERT INTO transactions (kind, description, amount, date, category, source_row) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.kind.to_string())
        .bind(&record.description)
        .bind(record.amount.value().to_string())
        .bind(record.date.to_string())
        .bind(&record.category)
        .bind(record.source_row_number as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(records.len())
}

pub async fn count_transactions(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Stored transactions within an inclusive date range, oldest first.
pub async fn get_transactions(
    pool: &DbPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, String, String, Option<String>, i64)>(
        "SELECT kind, description, amount, date, category, source_row FROM transactions WHERE date >= ? AND date <= ? ORDER BY date, id",
    )
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let kind = match r.0.as_str() {
                "income" => TransactionKind::Income,
                _ => TransactionKind::Expense,
            };
            let amount = Decimal::from_str(&r.2)
                .ok()
                .and_then(Amount::new)
                .ok_or_else(|| sqlx::Error::Decode(format!("invalid amount '{}'", r.2).into()))?;
            let date = NaiveDate::parse_from_str(&r.3, "%Y-%m-%d")
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            Ok(TransactionRecord {
                kind,
                description: r.1,
                amount,
                date,
                category: r.4,
                source_row_number: r.5 as usize,
            })
        })
        .collect()
}
