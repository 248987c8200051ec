//! CLI command handlers for `lens add`, `extract`, `query`, `remove` and `clear`.
//!
//! Human output goes to stdout; `--json` variants print a single JSON
//! document so scripts can consume it.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::RagError;
use crate::extract::{is_supported, ExtractOptions, Extractor};
use crate::models::{DocumentState, ElementType, IngestOutcome};
use crate::progress::ProgressMode;
use crate::rag::RagOrchestrator;

/// Directories skipped while walking inputs.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Expand `inputs` into the supported files they name.
///
/// Files are taken as given (unsupported ones fail at extraction with a
/// clear error). Directories are walked recursively, keeping supported
/// files only, in sorted order.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            bail!("No such file or directory: {}", input.display());
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(input).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.depth() > 0
                && SKIP_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
        });
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_supported(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

pub async fn run_add(
    orchestrator: &RagOrchestrator,
    inputs: &[PathBuf],
    options: ExtractOptions,
    progress: ProgressMode,
) -> Result<()> {
    let files = collect_inputs(inputs)?;
    if files.is_empty() {
        println!("No supported files found.");
        return Ok(());
    }

    let reporter = progress.reporter();
    let outcomes = orchestrator
        .add_documents_with_progress(&files, options, reporter.as_ref())
        .await;

    print_outcomes(&outcomes);

    let failed = outcomes.iter().filter(|o| !o.state.is_indexed()).count();
    println!(
        "add: {} indexed, {} failed, {} documents in collection",
        outcomes.len() - failed,
        failed,
        orchestrator.get_document_count().await?
    );
    if failed == outcomes.len() {
        bail!("no documents were indexed");
    }
    println!("ok");
    Ok(())
}

fn print_outcomes(outcomes: &[IngestOutcome]) {
    for o in outcomes {
        match &o.state {
            DocumentState::Failed { stage, reason } => {
                println!("  {}  FAILED after {}: {}", o.filename, stage, reason);
            }
            _ => {
                println!(
                    "  {}  {} elements ({}), {} chunks",
                    o.filename,
                    o.elements,
                    format_element_types(o.element_types.iter().map(|(t, n)| (*t, *n))),
                    o.chunks
                );
                for f in &o.failed_chunks {
                    println!("    chunk {} not embedded: {}", f.chunk_id, f.error);
                }
            }
        }
    }
}

fn format_element_types(counts: impl Iterator<Item = (ElementType, usize)>) -> String {
    let parts: Vec<String> = counts.map(|(t, n)| format!("{} {}", n, t)).collect();
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

/// Extract one file and print its elements without indexing anything.
pub fn run_extract(config: &Config, path: &Path, options: ExtractOptions, json: bool) -> Result<()> {
    let extractor = Extractor::from_config(&config.extraction);
    let doc = extractor
        .extract(path, &options)
        .with_context(|| format!("Failed to extract {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("filename:  {}", doc.filename());
    if let Some(pages) = doc.doc_metadata.page_count {
        println!("pages:     {}", pages);
    }
    println!(
        "elements:  {} ({})",
        doc.elements.len(),
        format_element_types(
            doc.doc_metadata
                .element_types
                .iter()
                .map(|(t, n)| (*t, *n))
        )
    );
    println!();

    for el in &doc.elements {
        let page = el
            .metadata
            .page
            .map(|p| format!(" p{}", p))
            .unwrap_or_default();
        println!("[{}{}] {}", el.metadata.element_index, page, el.element_type);
        if !el.content.is_empty() {
            println!("{}", el.content);
        }
        println!();
    }
    Ok(())
}

pub async fn run_query(
    orchestrator: &RagOrchestrator,
    question: &str,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    json: bool,
) -> Result<()> {
    let retrieval = &orchestrator.config().retrieval;
    let top_k = top_k.unwrap_or(retrieval.top_k);
    let min_similarity = min_similarity.unwrap_or(retrieval.min_similarity);

    let result = match orchestrator.query_with(question, top_k, min_similarity).await {
        Ok(result) => result,
        Err(RagError::Generation(e)) => {
            if !e.sources.is_empty() {
                eprintln!("Answer generation failed; retrieved sources:");
                for (i, s) in e.sources.iter().enumerate() {
                    eprintln!("  [Source {}] {} ({:.3})", i + 1, s.filename, s.similarity);
                }
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, s) in result.sources.iter().enumerate() {
            let page = s
                .page
                .map(|p| format!("page {}", p))
                .unwrap_or_else(|| "no page".to_string());
            println!(
                "  [Source {}] {}, {}, {}  (similarity {:.3})",
                i + 1,
                s.filename,
                page,
                s.element_type,
                s.similarity
            );
            println!("    {}", s.content.replace('\n', " "));
        }
    }
    Ok(())
}

pub async fn run_remove(orchestrator: &RagOrchestrator, filename: &str) -> Result<()> {
    let removed = orchestrator.remove_document(filename).await?;
    if removed == 0 {
        bail!("No indexed document named '{}'", filename);
    }
    println!("Removed {} ({} chunks).", filename, removed);
    Ok(())
}

pub async fn run_clear(orchestrator: &RagOrchestrator) -> Result<()> {
    let docs = orchestrator.get_document_count().await?;
    orchestrator.clear_collection().await?;
    println!("Cleared {} documents.", docs);
    Ok(())
}
