//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use lessonctx_core::classifier::audio_locator;
use lessonctx_core::lesson_types::{LESSON_TYPE_ALIASES, LESSON_TYPE_ALIASES_VERSION, lesson_types_for};
use lessonctx_core::{
    CachedStore, ConfiguredMedia, Context, ContextRequest, ContextResolver, MediaHandle,
    MediaSource,
};
use lessonctx_shared::{
    AppConfig, BookType, CurriculumKey, CurriculumStore, CurriculumTree, Grade, LessonCtxError,
    MediaConfig, Subject, Textbook, TextbookKey, TextbookStore, expand_home, init_config,
    load_config,
};
use lessonctx_storage::{IngestOutcome, Storage, shape_from_summary, textbook_key_from_summary};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lessonctx: resolve curriculum context for lesson generation.
#[derive(Parser)]
#[command(
    name = "lessonctx",
    version,
    about = "Resolve curriculum entries, textbook pages and media into lesson context.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides `storage.db_path`).
    #[arg(long, env = "LESSONCTX_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest a curriculum or textbook JSON file into the store.
    Ingest {
        #[command(subcommand)]
        what: IngestAction,
    },

    /// Resolve the context for one or more lessons and print it as JSON.
    Context {
        /// Grade, as "Grade 2" or "2".
        #[arg(long)]
        grade: String,

        /// Subject (English, Mathematics).
        #[arg(long)]
        subject: String,

        /// Lesson number (unit number for flat curricula). Repeatable.
        #[arg(long, required = true)]
        lesson: Vec<u32>,

        /// Lesson type, e.g. "listening" or "vocabulary_word_meaning".
        #[arg(long = "type")]
        lesson_type: String,

        /// Book types to resolve (comma-separated codes, e.g. LB,AB).
        #[arg(long, value_delimiter = ',')]
        books: Option<Vec<String>>,

        /// Without --books or a configured default, use the lesson type's usual books.
        #[arg(long)]
        type_defaults: bool,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Locate the media file or URL for an audio track.
    Media {
        #[arg(long)]
        grade: Grade,

        #[arg(long)]
        subject: Subject,

        /// Track number as printed in the curriculum.
        #[arg(long)]
        track: u32,
    },

    /// List stored curricula and textbooks.
    List,

    /// List requestable lesson types.
    LessonTypes {
        /// Limit to one subject.
        subject: Option<Subject>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Ingestion subcommands.
#[derive(Subcommand)]
pub(crate) enum IngestAction {
    /// Ingest a scheme-of-work document.
    Curriculum {
        /// Path to the curriculum JSON file.
        file: PathBuf,

        #[arg(long)]
        subject: Subject,

        #[arg(long)]
        grade: Grade,
    },
    /// Ingest extracted textbook pages.
    Textbook {
        /// Path to the page-array JSON file.
        file: PathBuf,

        #[arg(long)]
        subject: Subject,

        #[arg(long)]
        grade: Grade,

        /// Book type code or tag (LB, learners, AB, ...).
        #[arg(long)]
        book: BookType,

        /// Book title (defaults to the book type's display name).
        #[arg(long)]
        title: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so JSON output
/// on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lessonctx=info",
        1 => "lessonctx=debug",
        _ => "lessonctx=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Ingest { what } => match what {
            IngestAction::Curriculum {
                file,
                subject,
                grade,
            } => cmd_ingest_curriculum(db, &file, subject, grade).await,
            IngestAction::Textbook {
                file,
                subject,
                grade,
                book,
                title,
            } => cmd_ingest_textbook(db, &file, subject, grade, book, title).await,
        },
        Command::Context {
            grade,
            subject,
            lesson,
            lesson_type,
            books,
            type_defaults,
            pretty,
        } => {
            let requests: Vec<ContextRequest> = lesson
                .into_iter()
                .map(|n| {
                    let mut req = ContextRequest::new(&subject, &grade, n, &lesson_type);
                    req.books = books.clone();
                    req
                })
                .collect();
            cmd_context(db, requests, type_defaults, pretty).await
        }
        Command::Media {
            grade,
            subject,
            track,
        } => cmd_media(grade, subject, track).await,
        Command::List => cmd_list(db).await,
        Command::LessonTypes { subject } => cmd_lesson_types(subject),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn db_path(override_path: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    override_path.unwrap_or_else(|| expand_home(&config.storage.db_path))
}

fn read_input(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path).map_err(|e| LessonCtxError::io(path, e))?)
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message);
    Ok(spinner)
}

fn describe(outcome: IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Inserted => "stored",
        IngestOutcome::Replaced => "replaced",
        IngestOutcome::Unchanged => "unchanged",
    }
}

async fn cmd_ingest_curriculum(
    db: Option<PathBuf>,
    file: &Path,
    subject: Subject,
    grade: Grade,
) -> Result<()> {
    let config = load_config()?;
    let tree = CurriculumTree::from_document_json(&read_input(file)?)?;
    let key = CurriculumKey::new(subject, grade);

    if tree.shape() != subject.expected_shape() {
        warn!(%key, shape = %tree.shape(), "curriculum shape differs from subject default");
    }

    let progress = spinner(format!("Ingesting {key}"))?;
    let storage = Storage::open(&db_path(db, &config)).await?;
    let outcome = storage.put_curriculum(&key, &tree).await?;
    progress.finish_and_clear();

    info!(%key, ?outcome, "curriculum ingested");
    println!(
        "  {key}: {} ({} {} nodes)",
        describe(outcome),
        tree.node_count(),
        tree.shape()
    );
    Ok(())
}

async fn cmd_ingest_textbook(
    db: Option<PathBuf>,
    file: &Path,
    subject: Subject,
    grade: Grade,
    book: BookType,
    title: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let title = title.unwrap_or_else(|| book.display_name().to_string());
    let textbook = Textbook::from_pages_json(title, &read_input(file)?)?;
    if textbook.pages.is_empty() {
        return Err(eyre!("{} contains no pages", file.display()));
    }
    let key = TextbookKey::new(subject, grade, book);

    let progress = spinner(format!("Ingesting {key} ({} pages)", textbook.pages.len()))?;
    let storage = Storage::open(&db_path(db, &config)).await?;
    let outcome = storage.put_textbook(&key, &textbook).await?;
    progress.finish_and_clear();

    info!(%key, ?outcome, pages = textbook.pages.len(), "textbook ingested");
    println!(
        "  {key}: {} ({} pages)",
        describe(outcome),
        textbook.pages.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Context resolution
// ---------------------------------------------------------------------------

async fn cmd_context(
    db: Option<PathBuf>,
    mut requests: Vec<ContextRequest>,
    type_defaults: bool,
    pretty: bool,
) -> Result<()> {
    let config = load_config()?;
    if let Some(defaults) = &config.resolution.default_books {
        for req in requests.iter_mut().filter(|r| r.books.is_none()) {
            req.books = Some(defaults.clone());
        }
    }
    if type_defaults || config.resolution.type_default_books {
        requests = requests
            .into_iter()
            .map(ContextRequest::with_type_default_books)
            .collect();
    }

    let storage = Arc::new(Storage::open_readonly(&db_path(db, &config)).await?);
    let contexts = if config.resolution.cache {
        let cached = Arc::new(CachedStore::new(storage));
        let resolver = ContextResolver::new(cached.clone(), cached.clone());
        let contexts = resolve_all(&resolver, &requests).await?;
        debug!(stats = ?cached.stats(), "store cache");
        contexts
    } else {
        let resolver = ContextResolver::new(storage.clone(), storage);
        resolve_all(&resolver, &requests).await?
    };

    let json = match contexts.as_slice() {
        [single] => serde_json::to_value(single)?,
        many => serde_json::to_value(many)?,
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{rendered}");

    if let Some(miss) = contexts.into_iter().find(|c| !c.found) {
        miss.require_found()?;
    }
    Ok(())
}

async fn resolve_all<C, T>(
    resolver: &ContextResolver<C, T>,
    requests: &[ContextRequest],
) -> Result<Vec<Context>>
where
    C: CurriculumStore,
    T: TextbookStore,
{
    let mut contexts = Vec::with_capacity(requests.len());
    for request in requests {
        contexts.push(resolver.resolve(request).await?);
    }
    Ok(contexts)
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

async fn cmd_media(grade: Grade, subject: Subject, track: u32) -> Result<()> {
    let config = load_config()?;
    let media = ConfiguredMedia::from_config(&MediaConfig::try_from(&config)?)?;
    let locator = audio_locator(subject, grade, track);

    match media.open(&locator).await? {
        Some(MediaHandle::File(path)) => println!("{}", path.display()),
        Some(MediaHandle::Redirect(url)) => println!("{url}"),
        None => return Err(eyre!("no media file found for {locator}")),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

async fn cmd_list(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&db_path(db, &config)).await?;

    let curricula = storage.list_curricula().await?;
    println!("Curricula ({}):", curricula.len());
    for c in &curricula {
        let shape = shape_from_summary(c)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("unknown shape {:?}", c.shape));
        println!("  {:<12} {:<9} {:<13} {}", c.subject, c.grade, shape, c.ingested_at);
    }

    let textbooks = storage.list_textbooks().await?;
    println!("Textbooks ({}):", textbooks.len());
    for t in &textbooks {
        let kind = textbook_key_from_summary(t)
            .map(|k| k.book_type.code())
            .unwrap_or("?");
        println!(
            "  {:<12} {:<3} {:<4} {:<40} {:>4} pages",
            t.subject, t.grade, kind, t.title, t.page_count
        );
    }
    Ok(())
}

fn cmd_lesson_types(subject: Option<Subject>) -> Result<()> {
    let subjects = match subject {
        Some(s) => vec![s],
        None => Subject::ALL.to_vec(),
    };
    for subject in subjects {
        println!("{subject}:");
        for info in lesson_types_for(subject) {
            let books: Vec<_> = info.default_books.iter().map(|b| b.code()).collect();
            println!(
                "  {:<24} {:<10} {}",
                info.name,
                books.join(","),
                info.description
            );
        }
    }

    println!("Aliases (v{LESSON_TYPE_ALIASES_VERSION}):");
    for (name, targets) in LESSON_TYPE_ALIASES {
        println!("  {:<24} -> {}", name, targets.join(", "));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
