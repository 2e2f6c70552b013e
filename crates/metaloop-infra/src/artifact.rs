//! Local data files: the batch artifact and the candidate list.
//!
//! The artifact is rewritten after every terminal generator outcome, so a
//! crash mid-batch loses at most the page being processed. Writes go to a
//! sibling temp file first and are renamed into place.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use metaloop_types::artifact::BatchArtifact;
use metaloop_types::candidate::{Baseline, Candidate, page_url};
use metaloop_types::error::StorageError;
use metaloop_types::tracking::PageMetricsRow;

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn parse_error(path: &Path, e: serde_json::Error) -> StorageError {
    StorageError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Load the batch artifact. A missing file is an empty artifact.
pub async fn load_artifact(path: &Path) -> Result<BatchArtifact, StorageError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No artifact at {}, starting empty", path.display());
            return Ok(BatchArtifact::default());
        }
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| parse_error(path, e))
}

/// Persist the batch artifact as pretty JSON.
pub async fn save_artifact(path: &Path, artifact: &BatchArtifact) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| parse_error(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);
    tokio::fs::write(tmp, json).await.map_err(|e| io_error(tmp, e))?;
    tokio::fs::rename(tmp, path)
        .await
        .map_err(|e| io_error(path, e))?;
    Ok(())
}

/// One entry of the candidates file.
///
/// ```json
/// [{"path": "/pricing", "currentTitle": "Pricing", "pageText": "Plans start at..."}]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSeed {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_text: Option<String>,
}

pub async fn load_candidate_seeds(path: &Path) -> Result<Vec<CandidateSeed>, StorageError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| parse_error(path, e))
}

/// Turn seeds into generator candidates.
///
/// The baseline comes from `rows` (matched on the absolute page URL); pages
/// without metrics get a zero baseline. Pages whose latest artifact entry is
/// a failure carry that failure history forward.
pub fn build_candidates(
    site: &str,
    seeds: Vec<CandidateSeed>,
    rows: &[PageMetricsRow],
    artifact: &BatchArtifact,
) -> Vec<Candidate> {
    let by_url: HashMap<&str, &PageMetricsRow> =
        rows.iter().map(|r| (r.page_url.as_str(), r)).collect();

    seeds
        .into_iter()
        .map(|seed| {
            let url = page_url(site, &seed.path);
            let baseline = by_url
                .get(url.as_str())
                .map(|r| Baseline {
                    ctr: r.ctr,
                    impressions: r.impressions,
                })
                .unwrap_or(Baseline {
                    ctr: 0.0,
                    impressions: 0,
                });
            let prior_failures = artifact.prior_failures(&seed.path);
            Candidate {
                url,
                path: seed.path,
                baseline,
                current_title: seed.current_title,
                current_description: seed.current_description,
                page_text: seed.page_text,
                prior_failures,
            }
        })
        .collect()
}
