use crate::{
    analysis::{resolve_api_key, AnalyzerSelector, ConfiguredAnalyzers},
    config::Config,
    events::write_ndjson,
    extract::{Extractor, PdftotextExtractor},
    layout::LayerSource,
    locate::{batch_resolve, swarm::locate_one, FindingId, LocationResult, LocationTask},
    pipeline::{Pipeline, RunRequest},
    report::{RunReport, RunSummary},
    util::{ensure_dir, hash_file, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "drafting-audit")]
#[command(about = "Contract drafting audit: analyzer findings re-located onto PDF page geometry")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./drafting-audit.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Doctor {},
    Extract {
        #[arg(long)]
        input: PathBuf,
        /// Include each page's text in the output.
        #[arg(long)]
        with_text: bool,
    },
    Locate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, requires = "text", conflicts_with = "tasks")]
        page: Option<u32>,
        #[arg(long, requires = "page")]
        text: Option<String>,
        /// JSON file of `[{"page": 2, "text": "..."}, ...]`.
        #[arg(long)]
        tasks: Option<PathBuf>,
    },
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        analyzer: Option<AnalyzerSelector>,
        /// Skip the analyzer and use the built-in findings payload.
        #[arg(long)]
        mock: bool,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = if cfg_path.exists() {
        Config::load(&cfg_path)?
    } else {
        Config::default()
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Extract { input, with_text } => extract(&cfg, input, *with_text),
        Command::Locate {
            input,
            page,
            text,
            tasks,
        } => runtime()?.block_on(locate(&cfg, input, *page, text.as_deref(), tasks.as_deref())),
        Command::Analyze {
            input,
            analyzer,
            mock,
            out_dir,
        } => {
            let selector = analyzer.unwrap_or(cfg.analysis.default_analyzer);
            runtime()?.block_on(analyze(&cfg, input, selector, *mock, out_dir.as_deref()))
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config does not exist: {}", p.display()));
        }
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("drafting-audit.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("drafting-audit.example.toml"))
    }
}

/// Diagnostics go to stderr; stdout is reserved for command output and the
/// NDJSON event stream.
fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.output.out_dir).join("drafting-audit.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let extractor = PdftotextExtractor::new(cfg);
    let key_present = |endpoint: &crate::config::ModelEndpoint| resolve_api_key(endpoint).is_ok();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "pdftotext": {
                "exe": cfg.extraction.pdftotext_exe,
                "available": extractor.is_available(),
            },
            "default_analyzer": cfg.analysis.default_analyzer,
            "analyzers": {
                "gemini": { "model": cfg.analysis.gemini.model, "api_key": key_present(&cfg.analysis.gemini) },
                "openai": { "model": cfg.analysis.openai.model, "api_key": key_present(&cfg.analysis.openai) },
            },
            "locating": {
                "enabled": cfg.locating.enabled,
                "concurrency": cfg.locating.concurrency,
            },
        }))?
    );
    Ok(())
}

fn extract(cfg: &Config, input: &Path, with_text: bool) -> Result<()> {
    validate_input(cfg, input)?;
    let layer = PdftotextExtractor::new(cfg)
        .extract(input)
        .with_context(|| format!("extracting {}", input.display()))?;
    let document = layer.to_document();
    let pages: Vec<_> = document
        .pages()
        .iter()
        .map(|p| {
            let mut v = serde_json::json!({
                "page": p.number,
                "chars": p.text.chars().count(),
                "width": p.width,
                "height": p.height,
            });
            if with_text {
                v["text"] = serde_json::Value::String(p.text.clone());
            }
            v
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "page_count": document.page_count(),
            "pages": pages,
        }))?
    );
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskInput {
    page: u32,
    text: String,
}

async fn locate(
    cfg: &Config,
    input: &Path,
    page: Option<u32>,
    text: Option<&str>,
    tasks_file: Option<&Path>,
) -> Result<()> {
    validate_input(cfg, input)?;

    let owned_input = input.to_path_buf();
    let extractor = PdftotextExtractor::new(cfg);
    let layer = tokio::task::spawn_blocking(move || extractor.extract(&owned_input))
        .await
        .map_err(|e| anyhow!("extraction worker failed: {e}"))?
        .with_context(|| format!("extracting {}", input.display()))?;
    let source = Arc::new(LayerSource::new(Arc::new(layer)));

    let results = match (page, text, tasks_file) {
        (Some(page), Some(text), None) => vec![locate_one(source, page, text).await],
        (None, None, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading tasks: {}", path.display()))?;
            let inputs: Vec<TaskInput> =
                serde_json::from_str(&raw).with_context(|| "parsing tasks JSON")?;
            let tasks: Vec<LocationTask> = inputs
                .into_iter()
                .enumerate()
                .map(|(i, s)| LocationTask {
                    page_hint: s.page,
                    query: s.text,
                    owner: FindingId(i),
                })
                .collect();
            let mut results = batch_resolve(source, tasks, cfg.locating.concurrency).await;
            results.sort_by_key(|r| r.owner());
            results
        }
        _ => return Err(anyhow!("pass either --page with --text, or --tasks")),
    };

    let out: Vec<_> = results.iter().map(result_json).collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn result_json(r: &LocationResult) -> serde_json::Value {
    serde_json::json!({
        "found": r.found,
        "page": r.resolved_page,
        "rects": r.rects,
        "original_task": { "page": r.task.page_hint, "text": r.task.query },
    })
}

async fn analyze(
    cfg: &Config,
    input: &Path,
    selector: AnalyzerSelector,
    mock: bool,
    out_override: Option<&Path>,
) -> Result<()> {
    validate_input(cfg, input)?;

    let input_hash = hash_file(input).with_context(|| format!("hashing input: {}", input.display()))?;
    let run_key = if mock { "mock" } else { selector.as_str() };
    let job_id = sha256_hex(
        format!("{input_hash}:{run_key}:{}", cfg.normalized_for_hash()).as_bytes(),
    );
    info!("job_id={job_id}");

    let pipeline = Pipeline::new(
        cfg,
        Arc::new(PdftotextExtractor::new(cfg)),
        Arc::new(ConfiguredAnalyzers::new(cfg)),
    );

    let started = now_rfc3339();
    let mut rx = pipeline.spawn(RunRequest {
        input: input.to_path_buf(),
        analyzer: selector,
        mock,
    });

    let stdout = std::io::stdout();
    let mut findings = None;
    while let Some(event) = rx.recv().await {
        write_ndjson(&mut stdout.lock(), &event)?;
        if let crate::events::Event::Result { result } = event {
            findings = Some(result.errors);
        }
    }
    let Some(findings) = findings else {
        return Err(anyhow!("pipeline ended without a result event"));
    };

    if cfg.output.write_report_json {
        let out_root = out_override
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&cfg.output.out_dir));
        let job_dir = out_root.join(&job_id);
        ensure_dir(&job_dir)?;
        let report = RunReport {
            job_id: job_id.clone(),
            input: input.display().to_string(),
            input_sha256: input_hash,
            analyzer: run_key.to_string(),
            mock,
            started,
            finished: now_rfc3339(),
            summary: RunSummary::from_findings(&findings),
            errors: findings,
        };
        let path = job_dir.join(&cfg.output.report_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        if !ext.eq_ignore_ascii_case("pdf") {
            return Err(anyhow!("input is not a PDF: {}", input.display()));
        }
    } else {
        warn!("input has no extension; assuming PDF: {}", input.display());
    }

    let size = std::fs::metadata(input)
        .with_context(|| format!("stat input: {}", input.display()))?
        .len();
    if size > cfg.extraction.max_input_file_bytes {
        return Err(anyhow!(
            "input exceeds max_input_file_bytes ({size} > {})",
            cfg.extraction.max_input_file_bytes
        ));
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
