use sqlx::SqlitePool;

/// Create the collection tables. Idempotent.
///
/// `chunks` holds text and provenance; `chunk_vectors` holds one embedding
/// per chunk. Both carry `filename` so a document can be replaced or
/// removed with a single indexed delete.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            chunk_offset INTEGER NOT NULL,
            page INTEGER,
            element_type TEXT NOT NULL,
            element_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            indexed_at INTEGER NOT NULL,
            UNIQUE(filename, chunk_offset)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_filename ON chunk_vectors(filename)")
        .execute(pool)
        .await?;

    Ok(())
}
