use drafting_audit::{analysis::AnalyzerSelector, config::Config};

#[test]
fn parse_example_config() {
    let raw = include_str!("../drafting-audit.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.analysis.default_analyzer, AnalyzerSelector::Gemini);
    assert_eq!(cfg.locating.concurrency, 5);
    assert!(cfg.locating.placeholder_quotes.iter().any(|p| p == "N/A"));
    assert!(!cfg.output.out_dir.is_empty());
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[locating]\nenabled = false\nconcurrency = 2\nplaceholder_quotes = []\n")
        .expect("parse TOML");
    assert!(!cfg.locating.enabled);
    assert_eq!(cfg.analysis.openai.api_key_env, vec!["OPENAI_API_KEY".to_string()]);
    assert_eq!(cfg.extraction.pdftotext_exe, "pdftotext");
}

#[test]
fn load_reads_file_and_reports_bad_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("drafting-audit.toml");
    std::fs::write(&good, "[analysis]\ndefault_analyzer = \"openai\"\n").expect("write");
    let cfg = Config::load(&good).expect("load");
    assert_eq!(cfg.analysis.default_analyzer, AnalyzerSelector::Openai);
    assert_eq!(cfg.analysis.gemini.model, Config::default().analysis.gemini.model);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[locating\nenabled = ").expect("write");
    assert!(Config::load(&bad).is_err());
    assert!(Config::load(&dir.path().join("missing.toml")).is_err());
}

#[test]
fn config_hash_changes_with_settings() {
    let a = Config::default();
    let mut b = Config::default();
    b.locating.concurrency = 9;
    assert_eq!(a.normalized_for_hash(), Config::default().normalized_for_hash());
    assert_ne!(a.normalized_for_hash(), b.normalized_for_hash());
}

#[test]
fn file_hash_is_sha256_of_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("in.pdf");
    std::fs::write(&path, b"abc").expect("write");
    assert_eq!(
        drafting_audit::util::hash_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
