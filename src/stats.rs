//! Collection statistics and document listing.
//!
//! Provides a quick summary of what's indexed: document and chunk counts,
//! embedding models in use, and a per-document breakdown. Used by
//! `lens stats` and `lens list`.

use anyhow::Result;
use sqlx::Row;

use crate::rag::RagOrchestrator;

/// Run the stats command: query the collection and print a summary.
pub async fn run_stats(orchestrator: &RagOrchestrator) -> Result<()> {
    let config = orchestrator.config();
    let pool = orchestrator.index().pool();

    let total_docs = orchestrator.get_document_count().await?;
    let total_chunks = orchestrator.get_chunk_count().await?;

    let model_rows = sqlx::query(
        "SELECT model, dims, COUNT(*) AS n FROM chunk_vectors GROUP BY model, dims ORDER BY n DESC",
    )
    .fetch_all(pool)
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("doc-lens — Collection Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);

    if !model_rows.is_empty() {
        println!();
        println!("  Embeddings:");
        for row in &model_rows {
            let model: String = row.get("model");
            let dims: i64 = row.get("dims");
            let n: i64 = row.get("n");
            let active = if model == orchestrator.index().provider().model_name() {
                "  (active)"
            } else {
                ""
            };
            println!("    {:<28} {:>5} dims {:>8} vectors{}", model, dims, n, active);
        }
    }

    print_documents(orchestrator).await?;
    println!();
    Ok(())
}

/// Run the list command: one line per indexed document.
pub async fn run_list(orchestrator: &RagOrchestrator) -> Result<()> {
    if !orchestrator.has_documents().await? {
        println!("No documents indexed.");
        return Ok(());
    }
    print_documents(orchestrator).await
}

async fn print_documents(orchestrator: &RagOrchestrator) -> Result<()> {
    let docs = orchestrator.list_documents().await?;
    if docs.is_empty() {
        return Ok(());
    }

    println!();
    println!(
        "  {:<36} {:>6} {:>8}   {}",
        "DOCUMENT", "PAGES", "CHUNKS", "INDEXED"
    );
    println!("  {}", "-".repeat(72));
    for d in &docs {
        println!(
            "  {:<36} {:>6} {:>8}   {}",
            d.filename,
            d.pages,
            d.chunks,
            format_ts_relative(d.indexed_at)
        );
    }
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
