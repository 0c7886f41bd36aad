use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Backend, Commands};
use config::Config;
use glosser::annotate::{Annotator, ChatAnnotator, MockAnnotator};
use glosser::domain::ANNOTATION_CLASS;
use glosser::host::{Document, NodeId, PageFixture};
use glosser::scheduler::{source_text, AnnotationScheduler, SchedulerConfig, TaskRegistry};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glosser")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("glosser.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => {
            println!("{}", "No command given, see --help".yellow());
            Ok(())
        }
        Some(Commands::Scan { page, json }) => handle_scan_command(page, *json, config),
        Some(Commands::Run {
            page,
            backend,
            scroll,
            max_concurrent,
            target,
        }) => {
            let mut scheduler_config = config.scheduler_config();
            if let Some(max) = max_concurrent {
                scheduler_config = scheduler_config.with_max_concurrent((*max).max(1));
            }
            if let Some(target) = target {
                scheduler_config = scheduler_config.with_target_language(target.as_str());
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            runtime.block_on(handle_run_command(page, *backend, scroll, scheduler_config, config))
        }
    }
}

#[derive(Debug, Serialize)]
struct Candidate {
    id: u64,
    node: NodeId,
    tag: String,
    visible: bool,
    text: String,
}

fn handle_scan_command(path: &Path, json: bool, config: &Config) -> Result<()> {
    info!("Scanning page fixture: {}", path.display());
    let page = PageFixture::load(path)
        .context(format!("Failed to load page from {}", path.display()))?
        .into_page();
    let scheduler_config = config.scheduler_config();
    let filter = scheduler_config.filter();

    let candidates: Vec<Candidate> = page.with_document_mut(|doc| {
        let mut registry = TaskRegistry::new();
        let body = doc.body();
        registry.initial_scan(doc, &filter, body);
        registry
            .iter()
            .map(|task| Candidate {
                id: task.id.get(),
                node: task.node,
                tag: doc.tag(task.node).unwrap_or_default().to_string(),
                visible: false,
                text: source_text(doc, task.node),
            })
            .collect()
    });
    let candidates: Vec<Candidate> = candidates
        .into_iter()
        .map(|c| Candidate {
            visible: page.intersects(c.node, scheduler_config.prefetch_margin),
            ..c
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    println!("{} {} candidates", "Scan:".green(), candidates.len());
    for c in &candidates {
        let marker = if c.visible { "visible".cyan() } else { "offscreen".normal() };
        println!("  {:>4}  {:<6} {:<9} {}", c.id, c.tag, marker, preview(&c.text, 60));
    }
    Ok(())
}

async fn handle_run_command(
    path: &Path,
    backend: Backend,
    scroll: &[f64],
    scheduler_config: SchedulerConfig,
    config: &Config,
) -> Result<()> {
    let page = PageFixture::load(path)
        .context(format!("Failed to load page from {}", path.display()))?
        .into_page();

    let annotator: Arc<dyn Annotator> = match backend {
        Backend::Chat => {
            let chat = ChatAnnotator::from_env(config.annotator.api_key_env(), config.annotator.chat_config())
                .context("Failed to create annotation client")?;
            Arc::new(chat)
        }
        Backend::Mock => Arc::new(MockAnnotator::new()),
    };
    println!(
        "{} {} -> {} via {}",
        "Annotating:".green(),
        path.display(),
        scheduler_config.target_language,
        annotator.name()
    );

    let scheduler = AnnotationScheduler::new(page.clone(), annotator, scheduler_config);
    scheduler.enable();
    scheduler.drained().await;

    for offset in scroll {
        info!("Scrolling to {}", offset);
        println!("{} {}", "Scroll:".cyan(), offset);
        page.scroll_to(0.0, *offset);
        scheduler.drained().await;
    }

    page.with_document(|doc| print_outline(doc, doc.body(), 0));

    let stats = scheduler.stats();
    println!(
        "{} {} tasks, {} done, {} pending",
        "Done:".green(),
        stats.total,
        stats.done,
        stats.pending
    );
    scheduler.disable();
    Ok(())
}

fn print_outline(doc: &Document, node: NodeId, depth: usize) {
    let indent = "  ".repeat(depth);
    if let Some(text) = doc.text(node) {
        let text = text.trim();
        if !text.is_empty() {
            println!("{}{}", indent, preview(text, 80));
        }
        return;
    }
    let tag = doc.tag(node).unwrap_or_default();
    if doc.has_class(node, ANNOTATION_CLASS) {
        println!("{}{}", indent, preview(&doc.text_content(node), 80).green());
        return;
    }
    println!("{}{}", indent, format!("<{}>", tag).dimmed());
    for child in doc.children(node) {
        print_outline(doc, *child, depth + 1);
    }
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
