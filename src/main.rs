//! # Unidesk CLI (`unidesk`)
//!
//! The `unidesk` binary is the interface to the document question-answering
//! pipeline. It provides commands for database initialization, document
//! training, one-shot and interactive questioning, and inspection.
//!
//! ## Usage
//!
//! ```bash
//! unidesk --config ./unidesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `unidesk init` | Create the SQLite databases and run schema migrations |
//! | `unidesk train <files...>` | Extract, chunk, and index documents |
//! | `unidesk ask "<question>"` | Answer a single question |
//! | `unidesk repl` | Interactive question session |
//! | `unidesk stats` | Index and activity counters |
//! | `unidesk docs` | List trained documents |
//! | `unidesk completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the databases
//! unidesk init
//!
//! # Train on the course catalog and an enrollment notice
//! unidesk train catalogo.pdf edital-matricula.docx
//!
//! # Ask one question
//! unidesk ask "Quais são as modalidades de ensino?"
//!
//! # Interactive session
//! unidesk repl
//! ```

use std::io::Write;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use unidesk::config::{self, Config};
use unidesk::db;
use unidesk::index::IndexState;
use unidesk::logstore::SqliteActivityLog;
use unidesk::migrate;
use unidesk::pipeline::Pipeline;

/// Unidesk CLI — a document-grounded question answering pipeline for
/// university service desks.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file runs on the built-in defaults.
#[derive(Parser)]
#[command(
    name = "unidesk",
    about = "Unidesk — document-grounded question answering for university service desks",
    version,
    long_about = "Unidesk ingests institutional documents (PDF, DOCX, plain text) into a \
    SQLite-backed vector index and answers student questions from them, composing replies \
    through retrieval plus rule-based or generative composition."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./unidesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schemas.
    ///
    /// Creates the index and activity-log SQLite files with all required
    /// tables. Idempotent — running it multiple times is safe.
    Init,

    /// Train on one or more documents.
    ///
    /// Each file is extracted, chunked, embedded, and indexed under its
    /// file name. A failing file is reported and never aborts the rest.
    Train {
        /// Paths of the documents to index (.pdf, .docx, .txt).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a single question and exit.
    Ask {
        /// The question, quoted.
        question: String,
    },

    /// Interactive question session.
    ///
    /// Maintains conversation history for the lifetime of the session.
    /// Type `exit` to leave and `clear` to reset the history.
    Repl,

    /// Show index and activity counters.
    Stats,

    /// List trained documents, newest first.
    Docs,

    /// Generate shell completions to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unidesk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions don't need config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "unidesk", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Train { files } => run_train(&cfg, files).await,
        Commands::Ask { question } => run_ask(&cfg, &question).await,
        Commands::Repl => run_repl(&cfg).await?,
        Commands::Stats => run_stats(&cfg).await,
        Commands::Docs => run_docs(&cfg).await,
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> anyhow::Result<()> {
    let index_pool = db::connect(&cfg.storage.index_path).await?;
    migrate::run_index_migrations(&index_pool).await?;
    let activity_pool = db::connect(&cfg.storage.activity_log_path).await?;
    migrate::run_activity_migrations(&activity_pool).await?;
    println!("Databases initialized successfully.");
    Ok(())
}

async fn run_train(cfg: &Config, files: Vec<PathBuf>) {
    let pipeline = Pipeline::new(cfg.clone()).await;

    let files: Vec<(PathBuf, String)> = files
        .into_iter()
        .map(|path| {
            let name = display_name(&path);
            (path, name)
        })
        .collect();

    let outcomes = pipeline.train_many(&files).await;
    for outcome in &outcomes {
        let mark = if outcome.trained { "ok    " } else { "FAILED" };
        println!("  {}  {}", mark, outcome.source_name);
    }
    let trained = outcomes.iter().filter(|o| o.trained).count();
    println!("Trained {}/{} files.", trained, outcomes.len());
}

async fn run_ask(cfg: &Config, question: &str) {
    let pipeline = Pipeline::new(cfg.clone()).await;
    println!("{}", pipeline.answer(question).await);
}

async fn run_repl(cfg: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(cfg.clone()).await;
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!("Unidesk interactive session. Type 'exit' to leave, 'clear' to reset history.");
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" | "sair" => break,
            "clear" | "limpar" => {
                pipeline.clear_history().await;
                if interactive {
                    println!("History cleared.");
                }
                continue;
            }
            _ => {}
        }
        let reply = pipeline.answer(question).await;
        println!("{}\n", reply);
    }
    Ok(())
}

async fn run_stats(cfg: &Config) {
    let pipeline = Pipeline::new(cfg.clone()).await;
    let stats = pipeline.index_stats().await;
    let state = match pipeline.index_state() {
        IndexState::Ready => "ready",
        IndexState::Degraded => "degraded",
    };

    println!("Index");
    println!("  state:      {}", state);
    println!("  model:      {}", pipeline.embedding_model());
    println!("  documents:  {}", stats.total_documents);
    println!("  chunks:     {}", stats.total_chunks_estimate);

    match SqliteActivityLog::open(&cfg.storage.activity_log_path).await {
        Ok(log) => {
            let activity = log.stats().await;
            println!("Activity");
            println!("  answered questions:  {}", activity.answered_questions);
            println!("  trained uploads:     {}", activity.total_uploads);
        }
        Err(e) => println!("Activity log unavailable: {}", e),
    }
}

async fn run_docs(cfg: &Config) {
    let pipeline = Pipeline::new(cfg.clone()).await;
    let sources = pipeline.sources().await;
    if sources.is_empty() {
        println!("No documents trained yet.");
        return;
    }

    for source in sources {
        let when = chrono::DateTime::from_timestamp(source.extracted_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {}  {:>5} chunks  {}", when, source.chunk_count, source.source_name);
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
