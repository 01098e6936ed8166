mod common;

use common::*;
use paper_digest::config::{DEFAULT_FEED, DEFAULT_SMALL_MODEL, DEFAULT_SUMMARIZATION_PROMPT, DEFAULT_TOPIC};
use paper_digest::store::ArtifactStore;
use paper_digest::traits::ReportRenderer;
use paper_digest::{ConfigBundle, DigestError, ModelId, Overrides, Result, RunKey, Settings, TemplateRenderer};
use std::fs;

#[test]
fn test_bundle_load_creates_defaults() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let bundle = ConfigBundle::load(dir.path(), "robotics", "cs.RO")?;

    let folder = dir.path().join("config").join("robotics");
    assert!(folder.join("filter_prompt.txt").exists());
    assert!(folder.join("summarization_prompt.txt").exists());
    assert!(folder.join("config.yaml").exists());
    assert_eq!(bundle.feed.as_deref(), Some("cs.RO"));
    assert_eq!(bundle.filter_prompt.as_deref(), Some(DEFAULT_TOPIC));
    Ok(())
}

#[test]
fn test_blank_files_read_as_absent() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("config").join("default");
    fs::create_dir_all(&folder)?;
    fs::write(folder.join("filter_prompt.txt"), "  \n")?;
    fs::write(folder.join("summarization_prompt.txt"), "")?;
    fs::write(folder.join("config.yaml"), "providers: []\n")?;

    let bundle = ConfigBundle::load(dir.path(), "default", "cs.CV")?;
    assert_eq!(bundle.filter_prompt, None);
    assert_eq!(bundle.summarization_prompt, None);
    assert_eq!(bundle.feed, None);

    let settings = Settings::resolve(Some(&bundle), &Overrides::default())?;
    assert_eq!(settings.feed, DEFAULT_FEED);
    assert_eq!(settings.topic, DEFAULT_TOPIC);
    assert_eq!(settings.summarization_prompt, DEFAULT_SUMMARIZATION_PROMPT);
    assert_eq!(settings.small_model, ModelId::parse(DEFAULT_SMALL_MODEL).unwrap());
    Ok(())
}

#[test]
fn test_empty_bundle_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(ConfigBundle::load(dir.path(), " ", "cs.CV"), Err(DigestError::Config(_))));
}

#[test]
fn test_overrides_win_over_bundle() -> Result<()> {
    let bundle = ConfigBundle {
        feed: Some("cs.RO".to_string()),
        filter_prompt: Some("robots".to_string()),
        summarization_prompt: Some("Be brief.".to_string()),
        ..ConfigBundle::default()
    };
    let overrides = Overrides {
        feed: Some("cs.LG".to_string()),
        large_model: Some("azure-gpt-4o".to_string()),
        ..Overrides::default()
    };

    let settings = Settings::resolve(Some(&bundle), &overrides)?;

    assert_eq!(settings.feed, "cs.LG");
    assert_eq!(settings.topic, "robots");
    assert_eq!(settings.summarization_prompt, "Be brief.");
    assert_eq!(settings.large_model, ModelId::Managed { deployment: "gpt-4o".to_string() });
    Ok(())
}

#[test]
fn test_invalid_model_override_is_a_config_error() {
    let overrides = Overrides {
        small_model: Some("azure-".to_string()),
        ..Overrides::default()
    };
    assert!(matches!(Settings::resolve(None, &overrides), Err(DigestError::Config(_))));
}

#[test]
fn test_template_renderer_fills_placeholders() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates)?;
    fs::write(
        templates.join("paper_template.html"),
        "<h1>{{ feed }} {{ report_date }}</h1><p>{{ paper_count }}</p>{{ papers }}",
    )?;
    let store = ArtifactStore::new(dir.path().join("daily_json"));
    let key = RunKey::new(run_date(), "cs.CV");
    let mut p = paper("2401.00001", "Fast <b>GANs</b> & more");
    p.llm_summary = Some("line one\nline two".to_string());
    let artifact = store.save(&key, &[p])?;

    let output = TemplateRenderer::new().render(&artifact, &templates, "paper_template.html", &dir.path().join("daily_html"))?;

    assert_eq!(output, dir.path().join("daily_html").join("2024-01-15_cs.CV.html"));
    let html = fs::read_to_string(output)?;
    assert!(html.starts_with("<h1>cs.CV 2024-01-15</h1><p>1</p>"));
    assert!(html.contains("Fast &lt;b&gt;GANs&lt;/b&gt; &amp; more"));
    assert!(html.contains("line one<br>\nline two"));
    Ok(())
}

#[test]
fn test_missing_template_is_distinguishable() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("daily_json"));
    let artifact = store.save(&RunKey::new(run_date(), "cs.CV"), &[paper("a", "A")])?;

    let result = TemplateRenderer::new().render(&artifact, &dir.path().join("templates"), "missing.html", dir.path());

    assert!(matches!(result, Err(DigestError::TemplateNotFound { ref name, .. }) if name == "missing.html"));
    Ok(())
}
