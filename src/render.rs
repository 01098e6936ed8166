use crate::traits::ReportRenderer;
use crate::types::{DigestError, Paper, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Fills `{{ report_date }}`, `{{ feed }}`, `{{ paper_count }}` and `{{ papers }}`
/// in an HTML template with the contents of a run artifact.
#[derive(Debug, Default, Clone)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for TemplateRenderer {
    fn render(
        &self,
        artifact_path: &Path,
        template_dir: &Path,
        template_name: &str,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let template_path = template_dir.join(template_name);
        let template = fs::read_to_string(&template_path).map_err(|_| DigestError::TemplateNotFound {
            dir: template_dir.display().to_string(),
            name: template_name.to_string(),
        })?;

        let papers: Vec<Paper> = serde_json::from_str(&fs::read_to_string(artifact_path)?)?;
        let (report_date, feed) = report_identity(artifact_path)?;

        let html = template
            .replace("{{ report_date }}", &escape_html(&report_date))
            .replace("{{ feed }}", &escape_html(&feed))
            .replace("{{ paper_count }}", &papers.len().to_string())
            .replace("{{ papers }}", &render_cards(&papers));

        fs::create_dir_all(output_dir)?;
        let output_path = output_dir.join(format!("{}_{}.html", report_date, feed));
        fs::write(&output_path, html)?;

        info!("Rendered {} papers to {}", papers.len(), output_path.display());
        Ok(output_path)
    }
}

/// Date and feed of an artifact at `<feed>/<date>.json`.
fn report_identity(artifact_path: &Path) -> Result<(String, String)> {
    let date = artifact_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| DigestError::General(format!("unnamed artifact {}", artifact_path.display())))?;
    let feed = artifact_path
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("papers");
    Ok((date.to_string(), feed.to_string()))
}

fn render_cards(papers: &[Paper]) -> String {
    let mut html = String::new();
    for paper in papers {
        let _ = writeln!(html, "<article class=\"paper\">");
        let _ = writeln!(
            html,
            "  <h2><a href=\"{}\">{}</a></h2>",
            escape_html(&paper.source_url),
            escape_html(&paper.title)
        );
        if !paper.authors.is_empty() {
            let _ = writeln!(html, "  <p class=\"authors\">{}</p>", escape_html(&paper.authors.join(", ")));
        }
        if let Some(rating) = &paper.rating {
            let _ = writeln!(html, "  <ul class=\"scores\">");
            for (name, score) in rating.scores() {
                let _ = writeln!(html, "    <li>{}: {}</li>", name.trim_end_matches("_score"), score);
            }
            let _ = writeln!(html, "  </ul>");
            let _ = writeln!(html, "  <p class=\"tldr\"><strong>TL;DR:</strong> {}</p>", escape_html(&rating.tldr));
            if !rating.tldr_zh.is_empty() {
                let _ = writeln!(html, "  <p class=\"tldr-zh\">{}</p>", escape_html(&rating.tldr_zh));
            }
        }
        if let Some(summary) = &paper.llm_summary {
            let _ = writeln!(
                html,
                "  <div class=\"summary\">{}</div>",
                escape_html(summary).replace('\n', "<br>\n")
            );
        } else {
            let _ = writeln!(html, "  <p class=\"abstract\">{}</p>", escape_html(&paper.abstract_text));
        }
        let _ = writeln!(html, "</article>");
    }
    html
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
