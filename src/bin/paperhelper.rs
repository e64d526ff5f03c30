//! CLI binary for paperhelper-client.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig`,
//! shows a live status line while the service processes the paper, and
//! prints the resulting summary, glossary, and mind map.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paperhelper_client::{
    Artifacts, ClientConfig, Document, DocumentTracker, TrackerPhase, TrackerSnapshot,
    DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_MS,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Advisory upload limit. Enforced here for UX only — the service is the
/// authority and will reject oversized uploads itself.
const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Submit a paper to the PaperHelper service and print its summary,
/// glossary, and mind map.
#[derive(Parser, Debug)]
#[command(name = "paperhelper", version, about)]
struct Cli {
    /// Paper to analyse (PDF, Markdown, or plain text)
    input: PathBuf,

    /// Base URL of the PaperHelper service
    #[arg(long, env = "PAPERHELPER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Status-poll cadence in milliseconds
    #[arg(long, env = "PAPERHELPER_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Print the raw artifact bundle as JSON instead of formatted text
    #[arg(long)]
    json: bool,

    /// Verbose logging (equivalent to RUST_LOG=paperhelper_client=debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    advisory_checks(&cli.input)?;

    let config = ClientConfig::builder()
        .base_url(&cli.base_url)
        .poll_interval_ms(cli.poll_interval_ms)
        .build()
        .context("invalid configuration")?;

    let tracker = DocumentTracker::new(config).context("failed to set up client")?;

    let bar = status_bar();
    bar.set_message(format!("uploading {}…", cli.input.display()));

    let document = tracker
        .submit_path(&cli.input)
        .await
        .with_context(|| format!("upload of '{}' failed", cli.input.display()))?;
    bar.set_message(format!("{} — {}", document.filename, document.status));

    let snapshot = watch_until_settled(&tracker, &bar).await;
    bar.finish_and_clear();

    report(&cli, snapshot)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("paperhelper_client=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// UX-only pre-upload checks. Never duplicated in the transport — the
/// service remains the authority on what it accepts.
fn advisory_checks(input: &PathBuf) -> Result<()> {
    let meta = std::fs::metadata(input)
        .with_context(|| format!("cannot read '{}'", input.display()))?;
    if meta.len() > MAX_UPLOAD_BYTES {
        bail!(
            "'{}' is {:.1} MB, above the 25 MB advisory limit — the service will likely reject it",
            input.display(),
            meta.len() as f64 / (1024.0 * 1024.0)
        );
    }
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") | Some("md") | Some("markdown") | Some("txt") | Some("text") => {}
        _ => eprintln!(
            "{}",
            dim("note: service accepts PDF, Markdown, and plain text; other types may be rejected")
        ),
    }
    Ok(())
}

fn status_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  ⏱ {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Follow the tracker's watch channel, mirroring each status onto the
/// spinner, until the job settles.
async fn watch_until_settled(tracker: &DocumentTracker, bar: &ProgressBar) -> TrackerSnapshot {
    let mut rx = tracker.subscribe();
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if let Some(doc) = &snapshot.document {
            bar.set_message(format!("{} — {}", doc.filename, doc.status));
        }
        if snapshot.is_settled() {
            return snapshot;
        }
        if rx.changed().await.is_err() {
            return tracker.snapshot();
        }
    }
}

// ── Output rendering ─────────────────────────────────────────────────────────

fn report(cli: &Cli, snapshot: TrackerSnapshot) -> Result<()> {
    let document = snapshot
        .document
        .context("tracker settled without a document")?;

    match snapshot.phase {
        TrackerPhase::Failed => {
            let message = document.error.as_deref().unwrap_or("analysis failed");
            bail!("{} {}", red("analysis failed:"), message);
        }
        TrackerPhase::Completed => match snapshot.artifacts {
            Some(artifacts) => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&artifacts)?);
                } else {
                    print_artifacts(&document, &artifacts);
                }
                Ok(())
            }
            None => bail!(
                "analysis succeeded but artifacts could not be fetched: {}\nRe-run to retry.",
                snapshot
                    .artifact_error
                    .as_deref()
                    .unwrap_or("unknown error")
            ),
        },
        phase => bail!("unexpected final state {phase:?}"),
    }
}

fn print_artifacts(document: &Document, artifacts: &Artifacts) {
    println!("{}", bold(&format!("◆ {}", document.filename)));
    if !document.metadata.is_empty() {
        let mut pairs: Vec<_> = document.metadata.iter().collect();
        pairs.sort();
        let line = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", dim(&line));
    }

    println!("\n{}", cyan("── Summary ─────────────────────────────────"));
    println!("{}", artifacts.summary.trim());

    println!("\n{}", cyan("── Glossary ────────────────────────────────"));
    if artifacts.glossary.is_empty() {
        println!("{}", dim("(no glossary entries)"));
    }
    // Service ranking order, preserved as display order.
    for entry in &artifacts.glossary {
        println!(
            "{}  {}  {}",
            bold(&entry.term),
            dim(&format!("({:.2})", entry.score)),
            entry.definition
        );
        if !entry.references.is_empty() {
            println!("    {}", dim(&format!("refs: {}", entry.references.join(", "))));
        }
    }

    println!("\n{}", cyan("── Mind Map ────────────────────────────────"));
    let map = &artifacts.mind_map;
    println!(
        "{} nodes, {} edges",
        map.nodes.len(),
        map.edges.len()
    );
    for node in &map.nodes {
        println!("  • {} {}", node.label, dim(&format!("[{} w={:.2}]", node.id, node.weight)));
    }
    for edge in &map.edges {
        println!(
            "  {} ⟶ {} {}",
            edge.source,
            edge.target,
            dim(&format!("w={:.2}", edge.weight))
        );
    }
}
