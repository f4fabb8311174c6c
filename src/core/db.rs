use anyhow::{Error, Result};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Creates the tables used by the client if they don't exist yet.
pub fn initialize_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
}

pub async fn kv_get(db: &Connection, key: &str) -> Result<Option<String>, Error> {
    let k = key.to_owned();
    let value = db
        .call(move |conn| {
            let value: Option<String> = conn
                .query_row("SELECT value FROM kv WHERE key = ?", [k], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
        .await?;
    Ok(value)
}

pub async fn kv_set(db: &Connection, key: &str, value: &str) -> Result<(), Error> {
    let k = key.to_owned();
    let v = value.to_owned();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            [k, v],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}
