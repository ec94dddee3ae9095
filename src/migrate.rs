use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector index schema. Idempotent; runs every time the index
/// opens so a missing or wiped database comes back as a fresh empty index.
pub async fn run_index_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per trained source document
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            source_name TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            extracted_at INTEGER NOT NULL,
            PRIMARY KEY (collection, source_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per indexed chunk, embedding stored as little-endian f32 BLOB
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            source_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(collection, source_name, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(collection, source_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the activity log schema (questions/responses and uploads).
pub async fn run_activity_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT NOT NULL,
            response TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
