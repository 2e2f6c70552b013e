//! Prompt state service.
//!
//! Owns the three prompt layers on disk:
//!
//! ```text
//! <dir>/base.md            constraints, never written after creation
//! <dir>/quality.md         guidance, replaced wholesale by the learner
//! <dir>/patterns.json      append-only list of learned patterns
//! <dir>/backups/quality.<YYYYMMDDTHHMMSS>.md
//! ```
//!
//! Missing files are created with defaults on first load. The service holds
//! no lock; callers run the learner and the generator one after the other.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use metaloop_types::error::PromptError;
use metaloop_types::prompt::{Pattern, PromptState, QualityBackup};

use super::fs::FileSystem;

pub const BASE_FILE: &str = "base.md";
pub const QUALITY_FILE: &str = "quality.md";
pub const PATTERNS_FILE: &str = "patterns.json";
pub const BACKUP_DIR: &str = "backups";

/// Default constraints layer written on first use.
pub const DEFAULT_BASE: &str = r#"# Role

You write the HTML title and meta description for a single web page so that
searchers who see it in results are more likely to click.

# Hard constraints

- The description must be between 140 and 160 characters, spaces included.
- The title must stay under 60 characters and name the page's subject.
- Describe only what the page actually offers. Never invent prices, numbers,
  or claims that are not supported by the page content.
- Write in the page's language and in plain sentences. No emoji, no ALL CAPS,
  no quotation marks around the whole text.
- Respond only with the requested JSON object.
"#;

/// Default guidance layer written on first use. The learner replaces it.
pub const DEFAULT_QUALITY: &str = r#"# Quality guidance

- Lead with the concrete benefit or answer the searcher is looking for.
- Prefer specific nouns and numbers taken from the page over adjectives.
- Say what makes this page different from the other results for the query.
- End with a clear reason to click when space allows.
- Avoid filler such as "learn more", "click here", "discover", "unlock",
  "in today's world", or "comprehensive guide".
"#;

/// Reads and mutates the layered prompt state under one directory.
pub struct PromptService<F: FileSystem> {
    fs: F,
    dir: PathBuf,
}

impl<F: FileSystem> PromptService<F> {
    pub fn new(fs: F, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.dir.join(BACKUP_DIR).join(format!("{key}.md"))
    }

    /// Load all three layers, creating any missing file with its default.
    pub async fn load(&self) -> Result<PromptState, PromptError> {
        self.fs
            .create_dir_all(&self.dir)
            .await
            .map_err(|e| fs_error(&self.dir, e))?;

        let base = self.read_or_init(BASE_FILE, DEFAULT_BASE).await?;
        let quality = self.read_or_init(QUALITY_FILE, DEFAULT_QUALITY).await?;
        let patterns = self.load_patterns().await?;

        Ok(PromptState {
            base,
            quality,
            patterns,
        })
    }

    /// Effective system prompt for the generator.
    pub async fn system_prompt(&self) -> Result<String, PromptError> {
        Ok(render_system_prompt(&self.load().await?))
    }

    /// Archive the current quality layer verbatim, then replace it.
    ///
    /// Returns the backup key the prior content was stored under.
    pub async fn update_quality_prompt(
        &self,
        new_content: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PromptError> {
        let quality_path = self.path(QUALITY_FILE);
        let previous = self.read_or_init(QUALITY_FILE, DEFAULT_QUALITY).await?;

        let stamp = format!("quality.{}", now.format("%Y%m%dT%H%M%S"));
        let mut key = stamp.clone();
        let mut suffix = 1;
        while self.fs.exists(&self.backup_path(&key)).await {
            key = format!("{stamp}-{suffix}");
            suffix += 1;
        }

        let backup_path = self.backup_path(&key);
        self.fs
            .write_file(&backup_path, &previous)
            .await
            .map_err(|e| fs_error(&backup_path, e))?;
        self.fs
            .write_file(&quality_path, new_content)
            .await
            .map_err(|e| fs_error(&quality_path, e))?;

        tracing::info!(backup = %key, "quality prompt replaced");
        Ok(key)
    }

    /// Append patterns to the pattern log. Existing entries are never touched.
    ///
    /// Returns the total pattern count after the append.
    pub async fn append_patterns(&self, new_patterns: &[Pattern]) -> Result<usize, PromptError> {
        let mut patterns = self.load_patterns().await?;
        patterns.extend_from_slice(new_patterns);

        let json = serde_json::to_string_pretty(&patterns)
            .map_err(|e| PromptError::InvalidPatterns(e.to_string()))?;
        let path = self.path(PATTERNS_FILE);
        self.fs
            .write_file(&path, &json)
            .await
            .map_err(|e| fs_error(&path, e))?;

        tracing::info!(added = new_patterns.len(), total = patterns.len(), "patterns appended");
        Ok(patterns.len())
    }

    /// Backup keys, oldest first.
    pub async fn list_quality_backups(&self) -> Result<Vec<String>, PromptError> {
        let dir = self.dir.join(BACKUP_DIR);
        let files = self
            .fs
            .list_files(&dir)
            .await
            .map_err(|e| fs_error(&dir, e))?;

        let mut keys: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .filter(|name| name.starts_with("quality."))
            .filter_map(|name| name.strip_suffix(".md"))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    pub async fn read_quality_backup(&self, key: &str) -> Result<QualityBackup, PromptError> {
        let path = self.backup_path(key);
        let content = self
            .fs
            .read_file(&path)
            .await
            .map_err(|e| fs_error(&path, e))?;
        Ok(QualityBackup {
            key: key.to_string(),
            content,
        })
    }

    async fn read_or_init(&self, name: &str, default: &str) -> Result<String, PromptError> {
        let path = self.path(name);
        if !self.fs.exists(&path).await {
            tracing::info!(file = %path.display(), "creating default prompt layer");
            self.fs
                .write_file(&path, default)
                .await
                .map_err(|e| fs_error(&path, e))?;
            return Ok(default.to_string());
        }
        self.fs.read_file(&path).await.map_err(|e| fs_error(&path, e))
    }

    async fn load_patterns(&self) -> Result<Vec<Pattern>, PromptError> {
        let raw = self.read_or_init(PATTERNS_FILE, "[]").await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            PromptError::InvalidPatterns(format!("{}: {e}", self.path(PATTERNS_FILE).display()))
        })
    }
}

fn fs_error(path: &Path, e: std::io::Error) -> PromptError {
    PromptError::FileSystem(format!("{}: {e}", path.display()))
}

/// `base + quality + patterns`, with the pattern section only when non-empty.
pub fn render_system_prompt(state: &PromptState) -> String {
    let mut prompt = String::new();
    prompt.push_str(state.base.trim_end());
    prompt.push_str("\n\n");
    prompt.push_str(state.quality.trim_end());
    prompt.push('\n');

    if !state.patterns.is_empty() {
        prompt.push_str("\n# Learned patterns\n\n");
        prompt.push_str("These phrasings correlated with higher click-through on this site:\n\n");
        for (i, pattern) in state.patterns.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "{}. {} (impact x{:.2}, confidence {:.0}%, n={})\n   Example: {}",
                i + 1,
                pattern.description,
                pattern.impact,
                pattern.confidence * 100.0,
                pattern.sample_size,
                pattern.example,
            );
        }
    }

    prompt
}
