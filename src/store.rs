use crate::types::{Paper, Result, RunKey};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Persisted per-(date, feed) paper lists under `daily_json/<feed>/<date>.json`.
///
/// An artifact that exists and is non-empty marks its `RunKey` as complete.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, key: &RunKey) -> PathBuf {
        self.root
            .join(&key.feed)
            .join(format!("{}.json", key.date.format("%Y-%m-%d")))
    }

    pub fn is_complete(&self, key: &RunKey) -> bool {
        fs::metadata(self.artifact_path(key))
            .map(|metadata| metadata.is_file() && metadata.len() > 0)
            .unwrap_or(false)
    }

    /// Write the papers as pretty JSON, replacing any previous artifact in one rename.
    pub fn save(&self, key: &RunKey, papers: &[Paper]) -> Result<PathBuf> {
        let path = self.artifact_path(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(papers)?;
        let tmp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp_path, json).and_then(|_| fs::rename(&tmp_path, &path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        info!("Saved {} papers for {} to {}", papers.len(), key, path.display());
        Ok(path)
    }

    pub fn load(&self, key: &RunKey) -> Result<Vec<Paper>> {
        let path = self.artifact_path(key);
        debug!("Loading artifact {}", path.display());
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// `reports.json`: relative paths of every rendered report, newest first.
pub struct ReportIndex {
    index_path: PathBuf,
    html_dir: PathBuf,
    /// Prefix of each entry, relative to the project root.
    entry_prefix: String,
}

impl ReportIndex {
    pub fn new(index_path: impl Into<PathBuf>, html_dir: impl Into<PathBuf>) -> Self {
        let html_dir = html_dir.into();
        let entry_prefix = html_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            index_path: index_path.into(),
            html_dir,
            entry_prefix,
        }
    }

    /// Rewrite the index from the current contents of the HTML directory.
    ///
    /// A missing directory produces an empty index rather than a stale one.
    pub fn update(&self) -> Result<Vec<String>> {
        let entries = if self.html_dir.is_dir() {
            self.list_reports()?
        } else {
            warn!(
                "HTML directory {} does not exist; writing an empty report index",
                self.html_dir.display()
            );
            Vec::new()
        };

        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.index_path, serde_json::to_string_pretty(&entries)?)?;
        info!("{} updated with {} reports", self.index_path.display(), entries.len());
        Ok(entries)
    }

    fn list_reports(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.html_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("html") {
                if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                    entries.push(self.entry_for(name));
                }
            }
        }
        entries.sort_by(|a, b| b.cmp(a));
        Ok(entries)
    }

    fn entry_for(&self, file_name: &str) -> String {
        if self.entry_prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.entry_prefix, file_name)
        }
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }
}
