use drafting_audit::{
    analysis::{mock::MockProvider, AnalyzerSelector},
    config::Config,
    error::ExtractionError,
    events::{Event, EventSink, LogLevel, Stage},
    extract::Extractor,
    layout::{PageLayout, TextLayer},
    model::Finding,
    pipeline::{parse_payload, Pipeline, RunRequest},
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serves a fixed text layer, or a fixed failure, for any input path.
struct FixtureExtractor {
    pages: Vec<&'static str>,
    fail_empty: bool,
    unreadable: bool,
}

impl FixtureExtractor {
    fn pages(pages: &[&'static str]) -> Self {
        Self {
            pages: pages.to_vec(),
            fail_empty: false,
            unreadable: false,
        }
    }
}

impl Extractor for FixtureExtractor {
    fn extract(&self, _input: &Path) -> Result<TextLayer, ExtractionError> {
        if self.fail_empty {
            return Err(ExtractionError::EmptyTextLayer);
        }
        if self.unreadable {
            return Err(ExtractionError::Unreadable(
                "Syntax Error: Couldn't find trailer dictionary".into(),
            ));
        }
        Ok(TextLayer::new(
            self.pages
                .iter()
                .enumerate()
                .map(|(i, t)| PageLayout::from_text(i as u32 + 1, 612.0, 792.0, t))
                .collect(),
        ))
    }

    fn backend_name(&self) -> &str {
        "fixture"
    }
}

const FOUR_PAGES: [&str; 4] = [
    "Loan Agreement dated as of March 1, 2024",
    "Section 4. Interest",
    "The Interest Rate is 5%.",
    "Signatures",
];

fn pipeline(extractor: FixtureExtractor, provider: MockProvider) -> Pipeline {
    pipeline_with(&Config::default(), extractor, provider)
}

fn pipeline_with(cfg: &Config, extractor: FixtureExtractor, provider: MockProvider) -> Pipeline {
    Pipeline::new(cfg, Arc::new(extractor), Arc::new(provider))
}

fn request(mock: bool) -> RunRequest {
    RunRequest {
        input: PathBuf::from("agreement.pdf"),
        analyzer: AnalyzerSelector::Gemini,
        mock,
    }
}

async fn run_collect(p: &Pipeline, req: RunRequest) -> Vec<Event> {
    let mut rx = p.spawn(req);
    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    events
}

fn result_of(events: &[Event]) -> Vec<Finding> {
    match events.last() {
        Some(Event::Result { result }) => result.errors.clone(),
        other => panic!("last event is not a result: {other:?}"),
    }
}

fn stages_of(events: &[Event]) -> Vec<Stage> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Stage { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn drifted_quote_is_boxed_on_the_page_it_lives_on() {
    let response = json!({"errors": [{
        "location": "Page 2, Section 4",
        "error": "Rate conflicts with the rate schedule.",
        "suggestion": "Conform the rate.",
        "exact_quote": "The Interest Rate is 5%."
    }]})
    .to_string();
    let p = pipeline(FixtureExtractor::pages(&FOUR_PAGES), MockProvider::new(&response));
    let events = run_collect(&p, request(false)).await;
    let findings = result_of(&events);

    assert_eq!(findings.len(), 1);
    let boxes = findings[0].bounding_boxes.as_ref().expect("located");
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].page, 3);
    assert_eq!(boxes[0].page_width, 612.0);
    assert_eq!(boxes[0].page_height, 792.0);
    assert!(boxes[0].width > 0.0 && boxes[0].height > 0.0);
}

#[tokio::test]
async fn textless_document_yields_single_document_finding() {
    let p = pipeline(
        FixtureExtractor::pages(&["", "   "]),
        MockProvider::failing("must not be called"),
    );
    let events = run_collect(&p, request(false)).await;
    let findings = result_of(&events);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "Document");
    assert_eq!(findings[0].error, "Could not extract text from PDF.");
    assert_eq!(findings[0].suggestion, "Ensure PDF is text-based, not scanned image.");
    assert_eq!(stages_of(&events), vec![Stage::Extracting]);
}

#[tokio::test]
async fn mock_mode_survives_an_empty_text_layer() {
    let extractor = FixtureExtractor {
        pages: Vec::new(),
        fail_empty: true,
        unreadable: false,
    };
    let p = pipeline(extractor, MockProvider::failing("must not be called"));
    let events = run_collect(&p, request(true)).await;
    let findings = result_of(&events);

    assert_eq!(findings.len(), 6);
    assert!(findings.iter().all(|f| f.bounding_boxes.is_none()));
    assert!(findings.iter().all(|f| f.location != "Document"));
    assert_eq!(stages_of(&events).len(), 5);
}

#[tokio::test]
async fn mock_mode_survives_an_unparseable_document() {
    let extractor = FixtureExtractor {
        pages: Vec::new(),
        fail_empty: false,
        unreadable: true,
    };
    let p = pipeline(extractor, MockProvider::failing("must not be called"));
    let events = run_collect(&p, request(true)).await;
    let findings = result_of(&events);

    assert_eq!(findings.len(), 6);
    assert!(findings[0].error.contains("Amendment"));
    assert!(findings.iter().all(|f| f.bounding_boxes.is_none()));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Log { log }
            if log.level == LogLevel::Warning && log.message.contains("without a text layer")
    )));
}

#[tokio::test]
async fn unparseable_document_is_fatal_outside_mock_mode() {
    let extractor = FixtureExtractor {
        pages: Vec::new(),
        fail_empty: false,
        unreadable: true,
    };
    let p = pipeline(extractor, MockProvider::new(r#"{"errors": []}"#));
    let findings = result_of(&run_collect(&p, request(false)).await);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "Document");
    assert!(findings[0].error.starts_with("Could not read PDF:"));
}

#[tokio::test]
async fn placeholder_and_empty_quotes_are_not_located() {
    let response = json!([
        {"location": "Page 1", "error": "a", "suggestion": "a", "exact_quote": "dated as of"},
        {"location": "Page 3", "error": "b", "suggestion": "b", "exact_quote": "Interest Rate"},
        {"location": "Page 4", "error": "c", "suggestion": "c", "exact_quote": ""},
        {"location": "Page 4", "error": "d", "suggestion": "d", "exact_quote": "N/A"},
        {"location": "Preamble", "error": "e", "suggestion": "e", "exact_quote": "Signatures"}
    ])
    .to_string();
    let p = pipeline(FixtureExtractor::pages(&FOUR_PAGES), MockProvider::new(&response));
    let findings = result_of(&run_collect(&p, request(false)).await);

    assert_eq!(findings.len(), 5);
    assert_eq!(findings[0].bounding_boxes.as_ref().map(|b| b[0].page), Some(1));
    assert_eq!(findings[1].bounding_boxes.as_ref().map(|b| b[0].page), Some(3));
    assert!(findings[2].bounding_boxes.is_none());
    assert!(findings[3].bounding_boxes.is_none());
    assert!(findings[4].bounding_boxes.is_none());

    let wire = serde_json::to_value(&findings[2]).unwrap();
    assert!(wire.get("boundingBoxes").is_none());
}

#[tokio::test]
async fn unlocatable_quote_keeps_finding_without_boxes() {
    let response = json!({"errors": [{
        "location": "Page 2",
        "error": "x",
        "suggestion": "y",
        "exact_quote": "NonExistentGhostText"
    }]})
    .to_string();
    let p = pipeline(FixtureExtractor::pages(&FOUR_PAGES), MockProvider::new(&response));
    let findings = result_of(&run_collect(&p, request(false)).await);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].error, "x");
    assert!(findings[0].bounding_boxes.is_none());
}

#[tokio::test]
async fn invalid_json_becomes_a_system_finding() {
    let p = pipeline(
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::new("Sorry, I can't help with that."),
    );
    let events = run_collect(&p, request(false)).await;
    let findings = result_of(&events);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "System");
    assert_eq!(findings[0].error, "AI returned invalid JSON.");
    assert_eq!(findings[0].suggestion, "Retry analysis.");
    assert_eq!(
        stages_of(&events),
        vec![Stage::Extracting, Stage::Distributing, Stage::Analyzing]
    );
}

#[tokio::test]
async fn analyzer_failure_becomes_a_system_finding() {
    let p = pipeline(
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::failing("connection reset"),
    );
    let findings = result_of(&run_collect(&p, request(false)).await);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "System");
    assert!(findings[0].error.starts_with("Analysis failed:"));
    assert!(findings[0].error.contains("connection reset"));
    assert_eq!(findings[0].suggestion, "Check system logs and API keys.");
}

#[tokio::test]
async fn fenced_json_is_accepted() {
    let response = "```json\n{\"errors\": [{\"location\": \"Page 3\", \"error\": \"e\", \
                    \"suggestion\": \"s\", \"exact_quote\": \"5%\"}]}\n```";
    let p = pipeline(FixtureExtractor::pages(&FOUR_PAGES), MockProvider::new(response));
    let findings = result_of(&run_collect(&p, request(false)).await);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].bounding_boxes.is_some());
}

#[tokio::test]
async fn clean_document_has_empty_result() {
    let p = pipeline(
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::new(r#"{"errors": []}"#),
    );
    let events = run_collect(&p, request(false)).await;
    assert!(result_of(&events).is_empty());
}

#[tokio::test]
async fn mock_mode_skips_the_analyzer() {
    let p = pipeline(
        FixtureExtractor::pages(&[
            "This Amendment is dated as of June 3.",
            "The Commitment is [__].",
        ]),
        MockProvider::failing("must not be called"),
    );
    let findings = result_of(&run_collect(&p, request(true)).await);

    assert_eq!(findings.len(), 6);
    assert!(findings[0].error.contains("Amendment"));
    assert_eq!(findings[0].bounding_boxes.as_ref().map(|b| b[0].page), Some(1));
    assert_eq!(findings[2].bounding_boxes.as_ref().map(|b| b[0].page), Some(2));
    assert!(findings[5].bounding_boxes.is_none());
}

#[tokio::test]
async fn stages_arrive_in_order_and_result_is_last_and_unique() {
    let p = pipeline(
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::new(r#"{"errors": []}"#),
    );
    let events = run_collect(&p, request(false)).await;

    assert_eq!(
        stages_of(&events),
        vec![
            Stage::Extracting,
            Stage::Distributing,
            Stage::Analyzing,
            Stage::Finalizing,
            Stage::Locating,
        ]
    );
    assert_eq!(events.iter().filter(|e| e.is_result()).count(), 1);
    assert!(events.last().is_some_and(Event::is_result));
    assert!(events.iter().any(|e| matches!(e, Event::Log { .. })));
}

#[tokio::test]
async fn locating_can_be_disabled() {
    let mut cfg = Config::default();
    cfg.locating.enabled = false;
    let response = json!([{"location": "Page 3", "error": "e", "suggestion": "s", "exact_quote": "5%"}])
        .to_string();
    let p = pipeline_with(
        &cfg,
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::new(&response),
    );
    let findings = result_of(&run_collect(&p, request(false)).await);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].bounding_boxes.is_none());
}

#[tokio::test]
async fn abandoned_run_stops_before_work_and_still_returns() {
    let p = pipeline(
        FixtureExtractor::pages(&FOUR_PAGES),
        MockProvider::new(r#"{"errors": []}"#),
    );
    let (sink, rx) = EventSink::channel();
    drop(rx);
    let findings = p.run(request(false), sink).await;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "System");
}

#[test]
fn parse_payload_strips_fences_only_when_closed() {
    assert_eq!(parse_payload("```\n[]\n```").unwrap(), json!([]));
    assert_eq!(parse_payload("  {\"errors\": []}  ").unwrap(), json!({"errors": []}));
    assert!(parse_payload("```json\n[]").is_err());
}

#[test]
fn ndjson_lines_have_the_three_wire_shapes() {
    use drafting_audit::events::write_ndjson;

    let (sink, mut rx) = EventSink::channel();
    sink.stage(Stage::Analyzing, "AI is auditing clauses and identifying risks...");
    sink.warning("slow analyzer");
    sink.result(vec![Finding::new("Page 1", "e", "s").with_quote("q")]);
    drop(sink);

    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        write_ndjson(&mut out, &e).unwrap();
    }
    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["stage"], json!("analyzing"));
    assert_eq!(lines[1]["log"]["level"], json!("WARNING"));
    assert_eq!(lines[1]["log"]["message"], json!("slow analyzer"));
    assert_eq!(lines[2]["result"]["errors"][0]["exact_quote"], json!("q"));
    assert!(lines[2]["result"]["errors"][0].get("boundingBoxes").is_none());
}
