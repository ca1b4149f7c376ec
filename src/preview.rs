//! Live preview of the directory a new project would be created in.
//!
//! Form edits arrive in bursts; [`PreviewDebouncer`] keeps one pending timer,
//! fires a single request once input settles, and publishes only the response
//! to the most recently issued request.

use crate::consts::{PREVIEW_DEBOUNCE, PREVIEW_EXISTS_DELIMITER};
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Project form fields that affect the previewed path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreviewInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(rename = "researcherName", skip_serializing_if = "Option::is_none")]
    pub researcher_name: Option<String>,
    #[serde(rename = "organisationName", skip_serializing_if = "Option::is_none")]
    pub organisation_name: Option<String>,
}

impl PreviewInput {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set one field from its form name (`year`, `researcherName`, ...).
    ///
    /// An empty value clears the field.
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let text = || (!value.is_empty()).then(|| value.to_string());
        match field {
            "year" => {
                self.year = if value.is_empty() {
                    None
                } else {
                    let year = value
                        .parse()
                        .map_err(|_| eyre::eyre!("year must be a number, got `{value}`"))?;
                    Some(year)
                }
            }
            "summary" => self.summary = text(),
            "project" => self.project = text(),
            "site" => self.site = text(),
            "platform" => self.platform = text(),
            "root" => self.root = text(),
            "internal" => {
                self.internal = match value {
                    "" => None,
                    "true" | "yes" | "1" => Some(true),
                    "false" | "no" | "0" => Some(false),
                    other => eyre::bail!("internal must be true or false, got `{other}`"),
                }
            }
            "template" => self.template = text(),
            "researcherName" | "researcher" => self.researcher_name = text(),
            "organisationName" | "organisation" => self.organisation_name = text(),
            other => eyre::bail!("unknown preview field `{other}`"),
        }
        Ok(())
    }
}

/// The endpoint's answer, split into the proposed path and its existence flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub path: String,
    /// Text after the delimiter, usually `true` or `false`.
    pub exists: String,
}

impl Preview {
    /// Split `"<path> | Exists: <flag>"`. Without the delimiter the whole text is the path.
    pub fn parse(text: &str) -> Self {
        let text = text.trim().trim_matches('"');
        match text.split_once(PREVIEW_EXISTS_DELIMITER) {
            Some((path, exists)) => Preview {
                path: path.trim().to_string(),
                exists: exists.trim().to_string(),
            },
            None => Preview {
                path: text.trim().to_string(),
                exists: String::new(),
            },
        }
    }

    pub fn exists(&self) -> Option<bool> {
        match self.exists.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

/// Something that can compute a preview, normally the REST client.
#[async_trait]
pub trait PreviewSource: Send + Sync {
    async fn preview(&self, input: &PreviewInput) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Loading,
    Ready(Preview),
    Failed(String),
}

/// Collapses rapid input changes into one delayed preview request.
///
/// Timers are aborted on reschedule and on drop. Requests already sent are
/// left to finish, but each carries the sequence number it was issued with
/// and its answer is dropped unless no newer request has been issued since.
pub struct PreviewDebouncer<S> {
    source: Arc<S>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    last_input: Option<PreviewInput>,
    issued: Arc<AtomicU64>,
    state: Arc<watch::Sender<PreviewState>>,
}

impl<S: PreviewSource + 'static> PreviewDebouncer<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_delay(source, PREVIEW_DEBOUNCE)
    }

    pub fn with_delay(source: Arc<S>, delay: Duration) -> Self {
        let (state, _) = watch::channel(PreviewState::Idle);
        Self {
            source,
            delay,
            pending: None,
            last_input: None,
            issued: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Number of requests sent so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Record new form input. Returns `false` when it equals the previous input
    /// and nothing was rescheduled.
    pub fn update(&mut self, input: PreviewInput) -> bool {
        if self.last_input.as_ref() == Some(&input) {
            return false;
        }
        self.cancel();
        self.last_input = Some(input.clone());

        let source = Arc::clone(&self.source);
        let issued = Arc::clone(&self.issued);
        let state = Arc::clone(&self.state);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if input.is_empty() {
                tracing::debug!("preview input empty; not requesting");
                return;
            }
            let seq = issued.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(seq, "sending preview request");
            state.send_replace(PreviewState::Loading);
            // detached so a later reschedule cannot abort a request already sent
            tokio::spawn(fetch(source, input, seq, issued, state));
        }));
        true
    }

    /// Clear the pending timer, if any, and forget the last input so the same
    /// input can be scheduled again.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.last_input = None;
    }
}

async fn fetch<S: PreviewSource>(
    source: Arc<S>,
    input: PreviewInput,
    seq: u64,
    issued: Arc<AtomicU64>,
    state: Arc<watch::Sender<PreviewState>>,
) {
    let result = source.preview(&input).await;
    let latest = issued.load(Ordering::SeqCst);
    if seq != latest {
        tracing::debug!(seq, latest, "discarding stale preview response");
        return;
    }
    let next = match result {
        Ok(text) => PreviewState::Ready(Preview::parse(&text)),
        Err(e) => {
            tracing::warn!(seq, error = %e, "preview request failed");
            PreviewState::Failed(e.to_string())
        }
    };
    state.send_replace(next);
}

impl<S> Drop for PreviewDebouncer<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers with the project name after a per-project latency.
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<PreviewInput>>,
        slow_project: Option<&'static str>,
    }

    #[async_trait]
    impl PreviewSource for FakeSource {
        async fn preview(&self, input: &PreviewInput) -> Result<String> {
            self.calls.lock().unwrap().push(input.clone());
            let project = input.project.clone().unwrap_or_default();
            let latency = if self.slow_project == Some(project.as_str()) {
                Duration::from_secs(2)
            } else {
                Duration::from_millis(100)
            };
            tokio::time::sleep(latency).await;
            if project == "boom" {
                eyre::bail!("server said no");
            }
            Ok(format!("/data/{project} | Exists: false"))
        }
    }

    fn input(project: &str) -> PreviewInput {
        PreviewInput {
            year: Some(2024),
            project: Some(project.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn splits_on_exists_delimiter() {
        let p = Preview::parse("/data/proj1/out | Exists: true");
        assert_eq!(p.path, "/data/proj1/out");
        assert_eq!(p.exists, "true");
        assert_eq!(p.exists(), Some(true));

        let p = Preview::parse("\"/data/x\"");
        assert_eq!(p.path, "/data/x");
        assert_eq!(p.exists(), None);
    }

    #[test]
    fn input_fields_by_form_name() {
        let mut i = PreviewInput::default();
        assert!(i.is_empty());
        i.set("year", "2025").unwrap();
        i.set("researcherName", "Jane").unwrap();
        i.set("internal", "false").unwrap();
        assert_eq!(i.year, Some(2025));
        assert_eq!(i.internal, Some(false));
        let json = serde_json::to_value(&i).unwrap();
        assert_eq!(json["researcherName"], "Jane");
        assert!(json.get("site").is_none());

        i.set("researcherName", "").unwrap();
        assert_eq!(i.researcher_name, None);
        assert!(i.set("colour", "red").is_err());
        assert!(i.set("year", "soon").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_request() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        let mut rx = d.subscribe();
        for name in ["p", "pr", "pro", "proj"] {
            assert!(d.update(input(name)));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        rx.wait_for(|s| matches!(s, PreviewState::Ready(_)))
            .await
            .unwrap();

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![input("proj")]);
        assert_eq!(d.issued(), 1);
        assert_eq!(
            d.state(),
            PreviewState::Ready(Preview {
                path: "/data/proj".into(),
                exists: "false".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_input_does_not_reschedule() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        assert!(d.update(input("a")));
        assert!(!d.update(input("a")));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded() {
        let source = Arc::new(FakeSource {
            slow_project: Some("old"),
            ..Default::default()
        });
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        d.update(input("old"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        d.update(input("new"));
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(matches!(d.state(), PreviewState::Ready(ref p) if p.path == "/data/new"));

        // the slow answer to the first request lands after this point
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(source.calls.lock().unwrap().len(), 2);
        assert!(matches!(d.state(), PreviewState::Ready(ref p) if p.path == "/data/new"));
    }

    #[tokio::test(start_paused = true)]
    async fn same_input_can_be_resent_after_cancel() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        assert!(d.update(input("a")));
        d.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(source.calls.lock().unwrap().is_empty());

        assert!(d.update(input("a")));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls.lock().unwrap().len(), 1);
        assert!(matches!(d.state(), PreviewState::Ready(ref p) if p.path == "/data/a"));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_clears_pending_timer() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        d.update(input("a"));
        drop(d);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_published() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        let mut rx = d.subscribe();
        d.update(input("boom"));
        let state = rx
            .wait_for(|s| matches!(s, PreviewState::Failed(_)))
            .await
            .unwrap()
            .clone();
        assert_eq!(state, PreviewState::Failed("server said no".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_sends_nothing() {
        let source = Arc::new(FakeSource::default());
        let mut d = PreviewDebouncer::new(Arc::clone(&source));
        d.update(PreviewInput::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(d.issued(), 0);
        assert_eq!(d.state(), PreviewState::Idle);
    }
}
