//! Busy-indicator bookkeeping. Purely observational: nothing in the request
//! path depends on it.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use reqwest::header::HeaderName;
use tokio::sync::watch;

use super::{HttpRequest, HttpResponse, Middleware, Next};
use crate::error::ApiError;

/// Requests carrying this header never toggle the busy indicator. The
/// header is stripped before the request leaves the pipeline.
pub const SKIP_LOADING_HEADER: &str = "x-skip-loading";

const SILENT_PATHS: &[&str] = &["/health", "/notifications/poll", "/auth/refresh-token"];

#[derive(Clone)]
pub struct LoadingTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    /// In-flight request count per key.
    requests: Mutex<BTreeMap<String, usize>>,
    busy: watch::Sender<bool>,
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackerInner {
                requests: Mutex::new(BTreeMap::new()),
                busy,
            }),
        }
    }

    fn requests(&self) -> MutexGuard<'_, BTreeMap<String, usize>> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loading(&self) -> bool {
        !self.requests().is_empty()
    }

    pub fn is_loading_key(&self, key: &str) -> bool {
        self.requests().contains_key(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.requests()
            .keys()
            .map(|key| (key.clone(), true))
            .collect()
    }

    /// Change stream of the aggregate busy flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy.subscribe()
    }

    fn set(&self, key: &str, in_flight: bool) {
        let busy = {
            let mut requests = self.requests();
            if in_flight {
                *requests.entry(key.to_string()).or_insert(0) += 1;
            } else if let Some(count) = requests.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    requests.remove(key);
                }
            }
            !requests.is_empty()
        };
        self.inner.busy.send_replace(busy);
    }

    fn begin(&self, key: String) -> LoadingGuard {
        self.set(&key, true);
        LoadingGuard {
            tracker: self.clone(),
            key,
        }
    }
}

/// Clears the in-flight flag even when the request future is dropped.
struct LoadingGuard {
    tracker: LoadingTracker,
    key: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.tracker.set(&self.key, false);
    }
}

/// `METHOD path` with numeric path segments replaced by `:id`, so
/// `/api/policies/42` and `/api/policies/43` share one indicator.
pub fn request_key(request: &HttpRequest) -> String {
    let path = request.path();
    let normalized: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect();
    format!("{} {}", request.method, normalized.join("/"))
}

fn is_silent(request: &HttpRequest) -> bool {
    let path = request.path();
    SILENT_PATHS.iter().any(|silent| path.ends_with(silent))
}

pub struct LoadingInterceptor {
    tracker: LoadingTracker,
}

impl LoadingInterceptor {
    pub fn new(tracker: LoadingTracker) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Middleware for LoadingInterceptor {
    async fn handle(
        &self,
        mut request: HttpRequest,
        next: Next<'_>,
    ) -> Result<HttpResponse, ApiError> {
        let skip_header = HeaderName::from_static(SKIP_LOADING_HEADER);
        let skipped = request.headers.remove(&skip_header).is_some();
        if skipped || is_silent(&request) {
            return next.run(request).await;
        }

        let _guard = self.tracker.begin(request_key(&request));
        next.run(request).await
    }
}
