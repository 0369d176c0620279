//! Single-flight coordination for token refresh.
//!
//! The first caller starts the refresh and parks a shared future in the
//! gate; every caller that arrives while it is pending awaits that same
//! future and observes the same token or the same failure. The slot is
//! emptied by the refresh future itself as it resolves, on success and on
//! failure alike.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::ApiError;

type RefreshFuture = Shared<BoxFuture<'static, Result<String, ApiError>>>;

#[derive(Clone, Default)]
pub struct RefreshGate {
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

fn lock(slot: &Mutex<Option<RefreshFuture>>) -> MutexGuard<'_, Option<RefreshFuture>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Joins the pending refresh, or starts one with `start` when none is
    /// pending. `start` is not called when joining.
    pub async fn run<F>(&self, start: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<String, ApiError>>,
    {
        let shared = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("Token refresh already in flight; waiting for it");
                    pending.clone()
                }
                None => {
                    let refresh = start();
                    let in_flight = Arc::clone(&self.in_flight);
                    let future = async move {
                        let result = refresh.await;
                        lock(&in_flight).take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(future.clone());
                    future
                }
            }
        };
        shared.await
    }
}
