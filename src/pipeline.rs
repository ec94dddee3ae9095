//! The document question-answering pipeline.
//!
//! [`Pipeline`] wires extraction, chunking, the vector index, retrieval,
//! optional generation, and composition behind two entry points with hard
//! guarantees:
//!
//! - [`Pipeline::train`] returns a plain `bool` — any failure, from a
//!   corrupt file to an embedding outage, lands in the logs and comes back
//!   as `false`.
//! - [`Pipeline::answer`] always returns a non-empty reply — internal
//!   failures degrade through rule-based composition down to a fixed
//!   apology, never an error.
//!
//! Construction is infallible as well: a broken index or activity database
//! produces a degraded pipeline that keeps those guarantees.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunk::Chunker;
use crate::compose;
use crate::config::Config;
use crate::deadline::run_with_deadline;
use crate::error::{PipelineError, Result};
use crate::extract::{self, SourceFormat};
use crate::generate::Generator;
use crate::history::ConversationHistory;
use crate::index::{IndexState, VectorIndex};
use crate::logstore::{ActivityLog, NoopActivityLog, SqliteActivityLog};
use crate::models::{ConversationTurn, IndexStats, SourceInfo, TrainOutcome};
use crate::retrieve;

pub struct Pipeline {
    index: VectorIndex,
    chunker: Chunker,
    generator: Option<Generator>,
    activity: Arc<dyn ActivityLog>,
    history: Mutex<ConversationHistory>,
    top_k: usize,
    max_upload_bytes: u64,
    train_deadline: Duration,
}

impl Pipeline {
    /// Builds the full pipeline from config.
    ///
    /// Never fails: an unreachable embedding backend degrades the index,
    /// and an unusable activity database degrades logging to a no-op.
    pub async fn new(config: Config) -> Self {
        let index = VectorIndex::open(&config).await;

        let activity: Arc<dyn ActivityLog> =
            match SqliteActivityLog::open(&config.storage.activity_log_path).await {
                Ok(log) => Arc::new(log),
                Err(e) => {
                    warn!("activity log unavailable, continuing without: {}", e);
                    Arc::new(NoopActivityLog)
                }
            };

        Self::with_parts(&config, index, activity)
    }

    /// Builds a pipeline around an existing index and activity log.
    pub fn with_parts(config: &Config, index: VectorIndex, activity: Arc<dyn ActivityLog>) -> Self {
        Self {
            index,
            chunker: Chunker::new(&config.chunking),
            generator: Generator::from_config(&config.generation),
            activity,
            history: Mutex::new(ConversationHistory::new()),
            top_k: config.retrieval.top_k,
            max_upload_bytes: config.limits.max_upload_bytes,
            train_deadline: Duration::from_secs(config.limits.train_deadline_secs),
        }
    }

    // ============================================================
    // Training
    // ============================================================

    /// Extracts, chunks, and indexes one document.
    ///
    /// `display_name` is the name the document is cited under in answers.
    /// Returns `false` on any failure; details go to the logs.
    pub async fn train(&self, path: &Path, display_name: &str) -> bool {
        match self.try_train(path, display_name).await {
            Ok(trained) => trained,
            Err(e) => {
                warn!("training {} failed: {}", display_name, e);
                false
            }
        }
    }

    /// Trains a batch of files, one outcome per file. A failing file never
    /// aborts the rest of the batch.
    pub async fn train_many(&self, files: &[(PathBuf, String)]) -> Vec<TrainOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (path, name) in files {
            let trained = self.train(path, name).await;
            outcomes.push(TrainOutcome {
                source_name: name.clone(),
                trained,
            });
        }
        outcomes
    }

    async fn try_train(&self, path: &Path, display_name: &str) -> Result<bool> {
        if SourceFormat::from_path(path).is_none() {
            return Err(PipelineError::malformed(format!(
                "unsupported file type: {}",
                path.display()
            )));
        }
        let size = std::fs::metadata(path)?.len();
        if size > self.max_upload_bytes {
            return Err(PipelineError::malformed(format!(
                "{} is {} bytes, exceeding the {} byte upload limit",
                display_name, size, self.max_upload_bytes
            )));
        }

        // Extraction is the unbounded part (a pathological PDF can chew
        // forever), so it runs on the blocking pool under the training
        // deadline. Indexing below bounds itself per batch.
        let owned_path = path.to_path_buf();
        let owned_name = display_name.to_string();
        let text = match run_with_deadline("document extraction", self.train_deadline, async move {
            match tokio::task::spawn_blocking(move || {
                extract::extract_file(&owned_path, &owned_name)
            })
            .await
            {
                Ok(result) => result,
                Err(e) => Err(PipelineError::internal(format!(
                    "extraction task failed: {}",
                    e
                ))),
            }
        })
        .await
        {
            Ok(result) => result?,
            Err(timeout) => return Err(timeout),
        };

        let chunks = self.chunker.split(&text, display_name);
        if chunks.is_empty() {
            warn!("{} produced no indexable text", display_name);
            return Ok(false);
        }

        let chunk_count = chunks.len();
        if !self.index.add(&chunks).await {
            return Ok(false);
        }

        self.activity.log_upload(display_name).await;
        info!("trained {} ({} chunks)", display_name, chunk_count);
        Ok(true)
    }

    // ============================================================
    // Answering
    // ============================================================

    /// Answers a question from the indexed documents.
    ///
    /// Always returns a non-empty string. Blank questions get a fixed
    /// prompt to type one; everything else flows through retrieval,
    /// optional generation, and rule-based composition.
    pub async fn answer(&self, question: &str) -> String {
        let question = question.trim();
        if question.is_empty() {
            return compose::BLANK_QUESTION_REPLY.to_string();
        }

        self.activity.log_question(question).await;

        let response = self.answer_inner(question).await;
        // The non-empty guarantee is enforced here, whatever the path
        // above produced.
        let response = if response.trim().is_empty() {
            error!("composed reply was empty, substituting apology");
            compose::APOLOGY.to_string()
        } else {
            response
        };

        self.activity.log_response(question, &response).await;
        self.history.lock().await.record(question, &response);
        response
    }

    async fn answer_inner(&self, question: &str) -> String {
        let preview: String = question.chars().take(50).collect();
        info!("processing question: {}", preview);

        let hits = retrieve::retrieve(&self.index, question, self.top_k).await;
        info!("retrieved {} relevant chunks", hits.len());

        if !hits.is_empty() {
            if let Some(generator) = &self.generator {
                let context = compose::combined_content(&hits);
                if let Some(generated) = generator.complete(question, &context).await {
                    let sources = compose::distinct_sources(&hits);
                    return format!("{}\n\n{}", generated, compose::attribution(&sources));
                }
                info!("generation yielded nothing usable, composing from rules");
            }
        }

        compose::compose(question, &hits)
    }

    // ============================================================
    // Inspection & session state
    // ============================================================

    pub async fn index_stats(&self) -> IndexStats {
        self.index.stats().await
    }

    pub async fn sources(&self) -> Vec<SourceInfo> {
        self.index.sources().await
    }

    pub fn index_state(&self) -> IndexState {
        self.index.state()
    }

    pub fn embedding_model(&self) -> &str {
        self.index.model_name()
    }

    /// Conversation turns of this session, oldest first.
    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.history.lock().await.turns()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, StubProvider};
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.index_path = dir.path().join("index.db");
        config.storage.activity_log_path = dir.path().join("activity.db");
        config
    }

    async fn ready_pipeline(config: &Config) -> Pipeline {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(StubProvider { dims: 16 });
        let index = VectorIndex::open_with_provider(config, provider).await;
        Pipeline::with_parts(config, index, Arc::new(NoopActivityLog))
    }

    async fn degraded_pipeline(config: &Config) -> Pipeline {
        let index = VectorIndex::open(config).await;
        Pipeline::with_parts(config, index, Arc::new(NoopActivityLog))
    }

    #[tokio::test]
    async fn test_train_and_answer_cites_source() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        let file = dir.path().join("regulamento.txt");
        std::fs::write(
            &file,
            "A universidade oferece ensino EAD e presencial em todos os campi.",
        )
        .unwrap();
        assert!(pipeline.train(&file, "regulamento.txt").await);

        let reply = pipeline.answer("Quais são as modalidades?").await;
        assert!(reply.contains("EAD"));
        assert!(reply.contains("Presencial"));
        assert!(reply.contains("regulamento.txt"));
    }

    #[tokio::test]
    async fn test_train_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        let file = dir.path().join("planilha.xlsx");
        std::fs::write(&file, "dados").unwrap();
        assert!(!pipeline.train(&file, "planilha.xlsx").await);
        assert_eq!(pipeline.index_stats().await.total_documents, 0);
    }

    #[tokio::test]
    async fn test_train_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.limits.max_upload_bytes = 64;
        let pipeline = ready_pipeline(&config).await;

        let file = dir.path().join("grande.txt");
        std::fs::write(&file, "x".repeat(200)).unwrap();
        assert!(!pipeline.train(&file, "grande.txt").await);
    }

    #[tokio::test]
    async fn test_train_missing_file_fails_closed() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        assert!(!pipeline.train(&dir.path().join("nao_existe.txt"), "nao_existe.txt").await);
    }

    #[tokio::test]
    async fn test_train_many_reports_per_file_outcomes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        let good = dir.path().join("bom.txt");
        std::fs::write(&good, "Horário de atendimento da secretaria: 08:00 às 21:00.").unwrap();
        let files = vec![
            (good, "bom.txt".to_string()),
            (dir.path().join("faltando.txt"), "faltando.txt".to_string()),
        ];

        let outcomes = pipeline.train_many(&files).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].trained);
        assert!(!outcomes[1].trained);
    }

    #[tokio::test]
    async fn test_blank_question_gets_fixed_reply_without_history() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        let reply = pipeline.answer("   ").await;
        assert_eq!(reply, compose::BLANK_QUESTION_REPLY);
        assert!(pipeline.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_answer_is_never_empty_even_when_degraded() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = degraded_pipeline(&config).await;

        let reply = pipeline.answer("Qual o horário de atendimento?").await;
        assert!(!reply.trim().is_empty());
        assert!(reply.contains("segunda a sexta"));
    }

    #[tokio::test]
    async fn test_train_on_degraded_index_returns_false() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = degraded_pipeline(&config).await;

        let file = dir.path().join("guia.txt");
        std::fs::write(&file, "Conteúdo qualquer para indexar.").unwrap();
        assert!(!pipeline.train(&file, "guia.txt").await);
    }

    #[tokio::test]
    async fn test_answer_records_history_in_order() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = ready_pipeline(&config).await;

        pipeline.answer("Quais cursos existem?").await;
        pipeline.answer("Qual o valor da mensalidade?").await;

        let history = pipeline.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "Quais cursos existem?");
        assert_eq!(history[1].question, "Qual o valor da mensalidade?");

        pipeline.clear_history().await;
        assert!(pipeline.history().await.is_empty());
    }
}
