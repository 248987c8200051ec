//! Ingestion and query façade.
//!
//! [`RagOrchestrator`] wires the extractor, chunker, vector index, retriever
//! and answer synthesizer together. Each document moves through
//! `Uploaded → Extracted → Chunked → Indexed`, or stops at
//! `Failed { stage, reason }` where `stage` is the last stage it reached.
//! Failures are per document: a batch never aborts because one file is bad.
//!
//! The chat provider is only needed for answers, so it is built on the
//! first query that has something to answer from. `add`, `stats` and
//! `clear` work without LLM credentials.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::answer::{AnswerSynthesizer, NO_INFORMATION_ANSWER};
use crate::chunk::chunk_document;
use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::error::Result;
use crate::extract::{ExtractOptions, Extractor};
use crate::index::VectorIndex;
use crate::llm::{create_chat_provider, ChatProvider};
use crate::models::{DocumentState, DocumentSummary, IngestOutcome, QueryResult, Stage};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::retrieve::Retriever;

pub struct RagOrchestrator {
    extractor: Arc<Extractor>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    chat: OnceLock<Arc<dyn ChatProvider>>,
    config: Config,
}

impl RagOrchestrator {
    /// Assemble an orchestrator from ready-made collaborators. With
    /// `chat = None` the provider named in `config.llm` is built on demand.
    pub fn new(
        extractor: Arc<Extractor>,
        index: Arc<VectorIndex>,
        chat: Option<Arc<dyn ChatProvider>>,
        config: Config,
    ) -> Self {
        let retriever = Retriever::new(index.clone(), config.retrieval.max_chunks_per_page);
        let slot = OnceLock::new();
        if let Some(chat) = chat {
            let _ = slot.set(chat);
        }
        Self {
            extractor,
            index,
            retriever,
            chat: slot,
            config,
        }
    }

    /// Open the database and build every collaborator from `config`.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        let provider = create_provider(&config.embedding)?;
        let index = VectorIndex::new(pool, provider, config.embedding.batch_size).await?;
        let extractor = Extractor::from_config(&config.extraction);
        Ok(Self::new(
            Arc::new(extractor),
            Arc::new(index),
            None,
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn chat(&self) -> Result<Arc<dyn ChatProvider>> {
        if let Some(chat) = self.chat.get() {
            return Ok(chat.clone());
        }
        let chat = create_chat_provider(&self.config.llm)?;
        Ok(self.chat.get_or_init(|| chat).clone())
    }

    // ============ Ingestion ============

    /// Run one file through the pipeline, naming it after its file name.
    pub async fn add_document(&self, path: &Path, options: ExtractOptions) -> IngestOutcome {
        self.ingest(path.to_path_buf(), document_name(path), options)
            .await
    }

    /// Ingest uploaded bytes under their original `filename`.
    ///
    /// The bytes go to a temporary file with the same extension, which is
    /// removed when this returns whatever the outcome.
    pub async fn add_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        options: ExtractOptions,
    ) -> IngestOutcome {
        let suffix = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let staged = tempfile::Builder::new()
            .prefix("lens-upload-")
            .suffix(&suffix)
            .tempfile()
            .and_then(|mut file| {
                std::io::Write::write_all(&mut file, bytes)?;
                Ok(file)
            });
        match staged {
            Ok(file) => {
                self.ingest(file.path().to_path_buf(), filename.to_string(), options)
                    .await
            }
            Err(e) => {
                let mut outcome = IngestOutcome::new(filename);
                fail(&mut outcome, Stage::Uploaded, format!("failed to stage upload: {}", e));
                outcome
            }
        }
    }

    /// Ingest many files, at most `ingest.concurrency` at a time. Outcomes
    /// come back in input order.
    ///
    /// Inputs sharing a file name run one after another in input order, so
    /// the last of them is the version left in the index.
    pub async fn add_documents(&self, paths: &[PathBuf], options: ExtractOptions) -> Vec<IngestOutcome> {
        self.add_documents_with_progress(paths, options, &NoProgress)
            .await
    }

    pub async fn add_documents_with_progress(
        &self,
        paths: &[PathBuf],
        options: ExtractOptions,
        progress: &dyn IngestProgressReporter,
    ) -> Vec<IngestOutcome> {
        let total = paths.len() as u64;
        let done = AtomicU64::new(0);

        let mut groups: Vec<Vec<(usize, &PathBuf)>> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        for (i, path) in paths.iter().enumerate() {
            let slot = *group_of
                .entry(document_name(path))
                .or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
            groups[slot].push((i, path));
        }

        let done = &done;
        let mut pending = stream::iter(groups)
            .map(|group| async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (i, path) in group {
                    progress.report(IngestProgressEvent::Started {
                        filename: document_name(path),
                    });
                    let outcome = self.add_document(path, options).await;
                    progress.report(IngestProgressEvent::Finished {
                        outcome: outcome.clone(),
                        n: done.fetch_add(1, Ordering::SeqCst) + 1,
                        total,
                    });
                    outcomes.push((i, outcome));
                }
                outcomes
            })
            .buffer_unordered(self.config.ingest.concurrency.max(1));

        let mut results: Vec<(usize, IngestOutcome)> = Vec::with_capacity(paths.len());
        while let Some(outcomes) = pending.next().await {
            results.extend(outcomes);
        }

        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, o)| o).collect()
    }

    async fn ingest(&self, path: PathBuf, filename: String, options: ExtractOptions) -> IngestOutcome {
        let mut outcome = IngestOutcome::new(&filename);

        let extractor = self.extractor.clone();
        let name = filename.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract_as(&path, &name, &options)).await;
        let doc = match extracted {
            Ok(Ok(doc)) => doc,
            Ok(Err(e)) => {
                fail(&mut outcome, Stage::Uploaded, e.to_string());
                return outcome;
            }
            Err(e) => {
                fail(&mut outcome, Stage::Uploaded, format!("extraction task failed: {}", e));
                return outcome;
            }
        };
        outcome.state = DocumentState::Extracted;
        outcome.elements = doc.elements.len();
        outcome.element_types = doc.doc_metadata.element_types.clone();

        let chunks = chunk_document(&doc, self.config.chunking.max_chunk_chars);
        outcome.state = DocumentState::Chunked;
        outcome.chunks = chunks.len();
        tracing::debug!(filename = %filename, chunks = chunks.len(), "chunked document");

        match self.index.upsert(&filename, &chunks).await {
            Ok(report) => {
                outcome.failed_chunks = report.failed;
                if !chunks.is_empty() && report.stored == 0 {
                    let reason = outcome
                        .failed_chunks
                        .first()
                        .map(|f| format!("no chunk could be embedded: {}", f.error))
                        .unwrap_or_else(|| "no chunk could be embedded".to_string());
                    fail(&mut outcome, Stage::Chunked, reason);
                } else {
                    outcome.state = DocumentState::Indexed;
                    tracing::info!(
                        filename = %filename,
                        elements = outcome.elements,
                        chunks = report.stored,
                        failed = outcome.failed_chunks.len(),
                        "indexed document"
                    );
                }
            }
            Err(e) => fail(&mut outcome, Stage::Chunked, e.to_string()),
        }
        outcome
    }

    // ============ Query ============

    /// Answer `question` with the configured `top_k` and similarity floor.
    pub async fn query(&self, question: &str) -> Result<QueryResult> {
        self.query_with(
            question,
            self.config.retrieval.top_k,
            self.config.retrieval.min_similarity,
        )
        .await
    }

    pub async fn query_with(
        &self,
        question: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<QueryResult> {
        let hits = self.retriever.retrieve(question, top_k, min_similarity).await?;
        if hits.is_empty() {
            return Ok(QueryResult {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }
        let synthesizer = AnswerSynthesizer::new(self.chat()?, self.config.llm.excerpt_chars);
        Ok(synthesizer.answer(question, &hits).await?)
    }

    // ============ Collection bookkeeping ============

    pub async fn has_documents(&self) -> Result<bool> {
        Ok(self.index.count_documents().await? > 0)
    }

    pub async fn get_document_count(&self) -> Result<i64> {
        self.index.count_documents().await
    }

    pub async fn get_chunk_count(&self) -> Result<i64> {
        self.index.count_chunks().await
    }

    pub async fn clear_collection(&self) -> Result<()> {
        self.index.clear().await?;
        tracing::info!("cleared collection");
        Ok(())
    }

    /// Delete one document. Returns the number of chunks removed.
    pub async fn remove_document(&self, filename: &str) -> Result<u64> {
        let removed = self.index.remove_document(filename).await?;
        tracing::info!(filename, removed, "removed document");
        Ok(removed)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.index.list_documents().await
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Collection key for a file on disk: its file name.
fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn fail(outcome: &mut IngestOutcome, stage: Stage, reason: String) {
    tracing::error!(filename = %outcome.filename, %stage, error = %reason, "document failed");
    outcome.state = DocumentState::Failed { stage, reason };
}
