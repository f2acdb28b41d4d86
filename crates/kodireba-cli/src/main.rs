//! Kodireba CLI
//!
//! Renders lesson markdown, builds sandbox documents, serves a lesson catalog
//! and submits solutions from the terminal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kodireba_orchestrator::{
    serve, CatalogService, Config, HttpLessonClient, LessonCatalog, LessonController,
    LessonService, LessonSession, LocalStorage, ServerState, SubmitReport,
};
use kodireba_sandbox::{build_sandbox_document_with, Language, SandboxOptions};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Kodireba - interactive coding lessons
///
/// Runs learner HTML, CSS and JavaScript in a sandboxed preview and grades
/// submissions against lesson tests.
#[derive(Parser, Debug)]
#[command(name = "kodireba")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: kodireba.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render lesson markdown to HTML
    Render {
        /// Markdown file to render
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Build the sandbox document for a code file
    Sandbox {
        /// Code file (language inferred from the extension)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Language of the code: html, css or javascript
        #[arg(short, long)]
        language: Option<String>,

        /// Disable the loop iteration guard
        #[arg(long)]
        no_loop_guard: bool,
    },

    /// Serve a lesson catalog over HTTP
    Serve {
        /// Lesson catalog JSON file
        #[arg(long, value_name = "FILE")]
        catalog: Option<String>,

        /// Port for the HTTP server
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Submit a solution for grading
    Submit {
        /// Course slug
        course: String,

        /// Lesson slug
        lesson: String,

        /// File with the solution code
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Grade against a local catalog instead of the lesson API
        #[arg(long, value_name = "FILE")]
        offline: Option<PathBuf>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reopen the last visited lesson
    Continue,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    tracing::debug!(config = ?args.config, "Config file");

    match args.command {
        Command::Render { file } => render(&file),
        Command::Sandbox {
            file,
            language,
            no_loop_guard,
        } => sandbox(&config, &file, language.as_deref(), no_loop_guard),
        Command::Serve { catalog, port } => {
            run_server(&config, catalog.as_deref(), port).await
        }
        Command::Submit {
            course,
            lesson,
            file,
            offline,
            json,
        } => {
            let code = read_file(&file)?;
            let storage = open_storage(&config).await?;
            match offline {
                Some(catalog) => {
                    let catalog = LessonCatalog::load(&catalog)?;
                    let service = CatalogService::new(Arc::new(catalog));
                    submit(config, service, storage, (&course, &lesson), code, json).await
                }
                None => {
                    let service = HttpLessonClient::from_config(&config)?;
                    submit(config, service, storage, (&course, &lesson), code, json).await
                }
            }
        }
        Command::Continue => {
            let storage = open_storage(&config).await?;
            let service = HttpLessonClient::from_config(&config)?;
            let mut controller = LessonController::new(config, service, storage);
            match controller.resume().await? {
                Some(session) => {
                    print_lesson(session);
                    Ok(())
                }
                None => {
                    println!("No lesson visited yet.");
                    Ok(())
                }
            }
        }
    }
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))
}

async fn open_storage(config: &Config) -> anyhow::Result<LocalStorage> {
    LocalStorage::open(&config.storage_file)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

// ============================================================================
// Commands
// ============================================================================

fn render(file: &Path) -> anyhow::Result<()> {
    let source = read_file(file)?;
    if let Some(html) = kodireba_markdown::render_markdown(&source) {
        println!("{html}");
    }
    Ok(())
}

fn sandbox(
    config: &Config,
    file: &Path,
    language: Option<&str>,
    no_loop_guard: bool,
) -> anyhow::Result<()> {
    let code = read_file(file)?;
    let language = language.map_or_else(|| language_from_extension(file), Language::from_tag);
    let options = if no_loop_guard {
        SandboxOptions::without_loop_guard()
    } else {
        config.sandbox.options()
    };
    tracing::debug!(%language, loop_guard = options.loop_guard, "Building sandbox document");
    println!("{}", build_sandbox_document_with(&code, language, &options));
    Ok(())
}

fn language_from_extension(file: &Path) -> Language {
    file.extension()
        .and_then(|e| e.to_str())
        .map_or(Language::Html, Language::from_tag)
}

async fn run_server(
    config: &Config,
    catalog: Option<&str>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let catalog_path = catalog.unwrap_or(&config.server.catalog);
    let port = port.unwrap_or(config.server.port);

    tracing::info!(catalog = %catalog_path, "Loading lesson catalog");
    let catalog = LessonCatalog::load(catalog_path)?;
    println!(
        "Loaded {} lessons from {catalog_path}",
        catalog.lesson_count()
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Check if port {port} is already in use or try a different port with --port"
        )
    })?;
    println!("Serving lessons at http://{addr} (Ctrl+C to stop)");

    serve(listener, ServerState::new(catalog), async {
        let _ = tokio::signal::ctrl_c().await;
        println!();
        println!("Received Ctrl+C, shutting down...");
    })
    .await?;
    Ok(())
}

async fn submit<S: LessonService>(
    config: Config,
    service: S,
    storage: LocalStorage,
    (course, lesson): (&str, &str),
    code: String,
    json: bool,
) -> anyhow::Result<()> {
    let mut controller = LessonController::new(config, service, storage);
    let session = controller.open(course, lesson).await?;
    if !session.has_editor() {
        println!("'{}' is a theory lesson; nothing to submit.", session.page().lesson.title);
        return Ok(());
    }

    controller.edit(code)?;
    let report = controller.submit().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report.verdict)?);
        controller.close();
        return Ok(());
    }
    print_report(&report);

    let progress = controller.progress();
    println!("XP: {} (level {})", progress.xp, progress.level);
    if let Some(session) = controller.session() {
        if session.can_go_next() {
            if let Some(next) = &session.page().navigation.next {
                println!("Next lesson unlocked: {}", next.title);
            }
        }
    }
    controller.close();
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_lesson(session: &LessonSession) {
    let page = session.page();
    println!("{} / {}", page.course.title, page.lesson.title);
    println!("  URL: {}", page.url());
    println!("  Type: {}", page.lesson.content_type);
    if let Some(prev) = &page.navigation.prev {
        println!("  Previous: {}", prev.title);
    }
    if let Some(next) = &page.navigation.next {
        println!("  Next: {}", next.title);
    }
}

fn print_report(report: &SubmitReport) {
    let verdict = &report.verdict;
    let label = if verdict.passed { "PASSED" } else { "FAILED" };
    println!(
        "{label} - score {}% ({}/{} tests)",
        verdict.score,
        verdict.passed_count(),
        verdict.test_results.len()
    );
    for test in &verdict.test_results {
        let mark = if test.passed { "✓" } else { "✗" };
        println!("  {mark} {}", test.name);
        if let Some(hint) = &test.hint {
            println!("      {hint}");
        }
    }
    if verdict.xp_earned > 0 {
        println!("+{} XP", verdict.xp_earned);
    }
    if let Some(hint) = &report.auto_hint {
        println!();
        println!("Hint: {hint}");
    }
    if !verdict.passed {
        println!("Failed attempts: {}", report.outcome.failure_count);
    }
}
