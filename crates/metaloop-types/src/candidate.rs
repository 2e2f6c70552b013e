//! Candidate pages queued for description generation.

use serde::{Deserialize, Serialize};

use crate::generation::Attempt;

/// Observed click-through baseline for a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Clicks divided by impressions over the observation window.
    pub ctr: f64,
    pub impressions: u64,
}

impl Baseline {
    /// A baseline usable as a denominator for relative improvement.
    pub fn usable_ctr(&self) -> Option<f64> {
        (self.ctr > 0.0).then_some(self.ctr)
    }
}

/// A page queued for generation, read-only inside the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Page path, used as the key in the batch artifact.
    pub path: String,
    /// Absolute page URL, used for metrics queries and prompts.
    pub url: String,
    pub baseline: Baseline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_description: Option<String>,
    /// Extracted body text of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_text: Option<String>,
    /// Rejections recorded for this page by earlier runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_failures: Vec<Attempt>,
}

impl Candidate {
    pub fn new(site: &str, path: impl Into<String>, baseline: Baseline) -> Self {
        let path = path.into();
        Self {
            url: page_url(site, &path),
            path,
            baseline,
            current_title: None,
            current_description: None,
            page_text: None,
            prior_failures: Vec::new(),
        }
    }
}

/// Join a site root and a page path into an absolute URL.
///
/// Paths that are already absolute URLs are returned unchanged.
pub fn page_url(site: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let site = site.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{site}{path}")
    } else {
        format!("{site}/{path}")
    }
}
