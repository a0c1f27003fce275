use crate::{
    analysis::{mock::MOCK_FINDINGS, normalize, AnalyzerProvider, AnalyzerSelector, AUDIT_PROMPT},
    config::Config,
    error::{ExtractionError, PipelineError},
    events::{Event, EventSink, LogLevel, Stage},
    extract::Extractor,
    layout::{LayerSource, TextLayer},
    locate::{attach_results, batch_resolve, build_tasks},
    model::Finding,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// One document through extraction, analysis, normalization and location.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: PathBuf,
    pub analyzer: AnalyzerSelector,
    /// Skip the analyzer and use the built-in findings payload.
    pub mock: bool,
}

#[derive(Clone)]
pub struct Pipeline {
    cfg: Arc<Config>,
    extractor: Arc<dyn Extractor>,
    analyzers: Arc<dyn AnalyzerProvider>,
}

impl Pipeline {
    pub fn new(
        cfg: &Config,
        extractor: Arc<dyn Extractor>,
        analyzers: Arc<dyn AnalyzerProvider>,
    ) -> Self {
        Self {
            cfg: Arc::new(cfg.clone()),
            extractor,
            analyzers,
        }
    }

    /// Start a run in the background and return its event stream.
    pub fn spawn(&self, req: RunRequest) -> UnboundedReceiver<Event> {
        let (sink, rx) = EventSink::channel();
        let this = self.clone();
        tokio::spawn(async move {
            this.run(req, sink).await;
        });
        rx
    }

    /// Drive one run to completion. Always emits exactly one result event,
    /// last, and returns the same findings. Never panics or errors past this
    /// boundary: run-fatal failures become a single system finding.
    pub async fn run(&self, req: RunRequest, sink: EventSink) -> Vec<Finding> {
        let started = Instant::now();
        info!(
            "run input={} analyzer={} mock={}",
            req.input.display(),
            req.analyzer.as_str(),
            req.mock
        );

        let this = self.clone();
        let inner_sink = sink.clone();
        let handle = tokio::spawn(async move { this.drive(&req, &inner_sink).await });
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(PipelineError::Internal(format!("pipeline task failed: {e}"))),
        };

        let findings = match outcome {
            Ok(findings) => {
                sink.info(format!(
                    "analysis complete: {} finding(s) in {:.2}s",
                    findings.len(),
                    started.elapsed().as_secs_f64()
                ));
                findings
            }
            Err(e) => {
                let level = match e {
                    PipelineError::Internal(_) => LogLevel::Critical,
                    PipelineError::Abandoned(_) => LogLevel::Warning,
                    _ => LogLevel::Error,
                };
                sink.log(level, format!("run failed: {e}"));
                vec![e.into_finding()]
            }
        };

        sink.result(findings.clone());
        findings
    }

    async fn drive(&self, req: &RunRequest, sink: &EventSink) -> Result<Vec<Finding>, PipelineError> {
        enter(sink, Stage::Extracting, "Reading and extracting text from PDF...")?;
        // Mock runs exercise the stream without a usable document.
        let layer = match self.extract_text(req.input.clone()).await {
            Ok(layer) => Some(Arc::new(layer)),
            Err(PipelineError::Extraction(e)) if req.mock => {
                sink.warning(format!("mock mode: {e}; continuing without a text layer"));
                None
            }
            Err(e) => return Err(e),
        };
        let document = layer.as_ref().map(|l| l.to_document());
        if let Some(doc) = &document {
            sink.info(format!(
                "extracted {} page(s), {} chars via {}",
                doc.page_count(),
                doc.char_count(),
                self.extractor.backend_name()
            ));
        }

        enter(sink, Stage::Distributing, "Routing document to the reviewer...")?;
        let analyzer_name = if req.mock { "mock" } else { req.analyzer.as_str() };
        sink.info(format!(
            "routing {} page(s) to the {analyzer_name} analyzer",
            document.as_ref().map_or(0, |d| d.page_count())
        ));

        enter(sink, Stage::Analyzing, "AI is auditing clauses and identifying risks...")?;
        let payload = match (&document, req.mock) {
            (_, true) => {
                sink.info("mock mode: using built-in findings payload");
                parse_payload(MOCK_FINDINGS)?
            }
            (Some(doc), false) => {
                let raw = self.analyze(req.analyzer, doc.analysis_text()).await?;
                sink.info(format!("received {} chars from analyzer", raw.chars().count()));
                parse_payload(&raw)?
            }
            (None, false) => {
                return Err(PipelineError::Internal("no document to analyze".into()));
            }
        };

        enter(sink, Stage::Finalizing, "Normalizing audit findings...")?;
        let mut findings = normalize(payload);
        sink.info(format!("{} finding(s) after normalization", findings.len()));

        enter(sink, Stage::Locating, "Scanning PDF for precise highlight coordinates...")?;
        match layer {
            Some(layer) if self.cfg.locating.enabled => {
                self.locate(layer, &mut findings, sink).await;
            }
            Some(_) => sink.info("locating disabled by configuration"),
            None => sink.warning("no text layer; findings are returned without highlights"),
        }

        Ok(findings)
    }

    /// Extract on the blocking pool. A layer without any text is an error.
    async fn extract_text(&self, input: PathBuf) -> Result<TextLayer, PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let layer = match tokio::task::spawn_blocking(move || extractor.extract(&input)).await {
            Ok(r) => r?,
            Err(e) => {
                return Err(PipelineError::Internal(format!("extraction worker failed: {e}")));
            }
        };
        if !layer.to_document().has_text() {
            return Err(ExtractionError::EmptyTextLayer.into());
        }
        Ok(layer)
    }

    async fn locate(&self, layer: Arc<TextLayer>, findings: &mut [Finding], sink: &EventSink) {
        let tasks = build_tasks(findings, &self.cfg.locating.placeholder_quotes);
        sink.info(format!(
            "locating {} of {} finding(s)",
            tasks.len(),
            findings.len()
        ));
        let source = Arc::new(LayerSource::new(layer));
        let results = batch_resolve(source, tasks, self.cfg.locating.concurrency).await;
        let drifted = results
            .iter()
            .filter(|r| r.found && r.resolved_page != Some(r.task.page_hint))
            .count();
        let attempted = results.len();
        let located = attach_results(findings, results);
        sink.info(format!("located {located} finding(s), {drifted} on a neighboring page"));
        if located < attempted {
            sink.warning(format!(
                "{} quote(s) not found near their hinted page",
                attempted - located
            ));
        }
    }

    async fn analyze(&self, selector: AnalyzerSelector, text: String) -> Result<String, PipelineError> {
        let provider = Arc::clone(&self.analyzers);
        let joined = tokio::task::spawn_blocking(move || {
            let analyzer = provider.analyzer(selector)?;
            debug!("analyzer {} ready", analyzer.name());
            analyzer.analyze(AUDIT_PROMPT, &text)
        })
        .await;
        match joined {
            Ok(r) => Ok(r?),
            Err(e) => Err(PipelineError::Internal(format!("analyzer worker failed: {e}"))),
        }
    }
}

fn enter(sink: &EventSink, stage: Stage, message: &str) -> Result<(), PipelineError> {
    if sink.is_closed() {
        return Err(PipelineError::Abandoned(stage.as_str()));
    }
    sink.stage(stage, message);
    Ok(())
}

/// Parse analyzer text as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_payload(raw: &str) -> Result<Value, PipelineError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(PipelineError::InvalidJson)
}
