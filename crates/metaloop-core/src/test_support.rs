//! In-memory doubles for the core ports.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use metaloop_types::audit::{
    AuditCategory, AuditEvent, AuditRecord, OutcomePage, TrackedAttributes, TrackerEvent,
};
use metaloop_types::error::{MetricsError, OutcomeStoreError};
use metaloop_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, Usage,
};
use metaloop_types::tracking::{OutcomeCategory, PageMetrics, PageMetricsRow};

use crate::audit::OutcomeStore;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;
use crate::metrics::MetricsSource;
use crate::service::fs::FileSystem;

type Script = dyn Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync;

/// LLM double driven by a closure over `(request, call_index)`.
/// Every request is recorded.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Script>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer calls in order with `replies`; further calls fail.
    pub fn replies(replies: Vec<&str>) -> Self {
        let replies: Vec<String> = replies.into_iter().map(str::to_string).collect();
        Self::new(move |_, i| {
            replies.get(i).cloned().ok_or_else(|| LlmError::Provider {
                message: format!("script exhausted at call {i}"),
            })
        })
    }

    pub fn boxed(&self) -> BoxLlmProvider {
        BoxLlmProvider::new(self.clone())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        let content = (self.script)(request, index)?;
        Ok(CompletionResponse {
            id: format!("msg_{index}"),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}

/// Outcome store kept in a vector, with an optional server-side page cap
/// so pagination can be exercised.
#[derive(Default)]
pub struct MemoryOutcomeStore {
    records: Mutex<Vec<AuditRecord>>,
    page_cap: Option<usize>,
    queries: Mutex<Vec<(AuditCategory, usize)>>,
    fail_writes: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryOutcomeStore {
    pub fn with_page_cap(cap: usize) -> Self {
        Self {
            page_cap: Some(cap),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Seed a record with an explicit timestamp.
    pub fn insert(&self, scope: &str, event: AuditEvent, recorded_at: DateTime<Utc>) {
        self.records
            .lock()
            .unwrap()
            .push(AuditRecord::new(scope, event, recorded_at));
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn categories(&self) -> Vec<AuditCategory> {
        self.records().iter().map(|r| r.event.category()).collect()
    }

    pub fn queries(&self) -> Vec<(AuditCategory, usize)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_offsets(&self) -> Vec<usize> {
        self.queries().into_iter().map(|(_, offset)| offset).collect()
    }
}

impl OutcomeStore for MemoryOutcomeStore {
    async fn record(&self, record: &AuditRecord) -> Result<(), OutcomeStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(OutcomeStoreError::Storage("store offline".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn query_by_category(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<OutcomePage, OutcomeStoreError> {
        self.queries.lock().unwrap().push((category, offset));
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(OutcomeStoreError::Storage("store offline".to_string()));
        }
        let limit = self.page_cap.map_or(limit, |cap| cap.min(limit));
        let matching: Vec<AuditRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.category() == category && r.recorded_at >= since)
            .cloned()
            .collect();
        let records: Vec<AuditRecord> = matching.iter().skip(offset).take(limit).cloned().collect();
        let has_more = offset + records.len() < matching.len();
        Ok(OutcomePage { records, has_more })
    }
}

/// Tracker event for `page` with filler attributes.
pub fn tracker_event(page: &str, category: OutcomeCategory) -> AuditEvent {
    let attrs = TrackedAttributes {
        page: page.to_string(),
        title: format!("Title for {page}"),
        description: format!("Description for {page}"),
        current_ctr: Some(0.05),
        baseline_ctr: Some(0.03),
        improvement: "+66.7%".to_string(),
        impressions: 400,
    };
    AuditEvent::Tracker(match category {
        OutcomeCategory::HighCtr => TrackerEvent::HighCtr(attrs),
        OutcomeCategory::Improved => TrackerEvent::Improved(attrs),
        OutcomeCategory::NoImprovement => TrackerEvent::NoImprovement(attrs),
        OutcomeCategory::InsufficientData => TrackerEvent::InsufficientData(attrs),
    })
}

/// Metrics keyed by page URL, with an optional per-call delay and a
/// high-water mark of concurrent calls.
#[derive(Default)]
pub struct MemoryMetrics {
    pages: HashMap<String, PageMetrics>,
    delay: Option<Duration>,
    fail_page: Option<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MemoryMetrics {
    pub fn with_page(mut self, url: &str, ctr: f64, impressions: u64) -> Self {
        let clicks = (ctr * impressions as f64).round() as u64;
        self.pages.insert(
            url.to_string(),
            PageMetrics {
                ctr,
                impressions,
                clicks,
            },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.fail_page = Some(url.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetricsSource for MemoryMetrics {
    async fn query_by_page(
        &self,
        _site: &str,
        page_url: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PageMetrics>, MetricsError> {
        self.calls
            .lock()
            .unwrap()
            .push((page_url.to_string(), start, end));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_page.as_deref() == Some(page_url) {
            return Err(MetricsError::Unavailable("quota exceeded".to_string()));
        }
        Ok(self.pages.get(page_url).copied())
    }

    async fn query_all(
        &self,
        _site: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PageMetricsRow>, MetricsError> {
        let mut rows: Vec<PageMetricsRow> = self
            .pages
            .iter()
            .map(|(url, m)| PageMetricsRow {
                page_url: url.clone(),
                ctr: m.ctr,
                impressions: m.impressions,
            })
            .collect();
        rows.sort_by(|a, b| a.page_url.cmp(&b.page_url));
        Ok(rows)
    }
}

#[derive(Default)]
struct MemoryFs {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

/// Filesystem held in a map. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    inner: Arc<Mutex<MemoryFs>>,
}

impl MemoryFileSystem {
    pub fn put(&self, path: impl AsRef<Path>, content: &str) {
        self.inner
            .lock()
            .unwrap()
            .files
            .insert(path.as_ref().to_path_buf(), content.to_string());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.inner.lock().unwrap().files.get(path.as_ref()).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }
}

impl FileSystem for MemoryFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        let mut fs = self.inner.lock().unwrap();
        if let Some(parent) = path.parent() {
            fs.dirs.insert(parent.to_path_buf());
        }
        fs.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        self.inner
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        self.inner.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        let fs = self.inner.lock().unwrap();
        fs.files.contains_key(path) || fs.dirs.contains(path)
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }
}
