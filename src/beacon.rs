//! Best-effort "send and forget" notifications.
//!
//! Nothing here is acknowledged or retried. A notification may be lost if the
//! process exits before the request leaves, and callers must not rely on it
//! for correctness. The backend is expected to reconcile on its own (for
//! example by closing stale attempts).

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::runtime::Handle;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::ApiError;

const BEACON_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Beacon {
    client: ApiClient,
}

impl Beacon {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// POSTs `body` to `path` on a detached task and returns immediately.
    pub fn send(&self, path: &str, body: Option<Value>) {
        let client = self.client.clone();
        let path = path.to_string();
        let mut options = RequestOptions::new()
            .method(Method::Post)
            .timeout(BEACON_TIMEOUT)
            .retries(0);
        if let Some(body) = body {
            options = options.json(body);
        }

        let label = format!("POST {}", path);
        spawn_detached(label, async move { client.request(&path, options).await.map(|_| ()) });
    }
}

/// Runs `fut` on the current runtime without awaiting it. Failures are only logged.
pub fn spawn_detached<F>(label: String, fut: F)
where
    F: Future<Output = Result<(), ApiError>> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                match fut.await {
                    Ok(()) => debug!("Best-effort {} delivered", label),
                    Err(e) => warn!("Best-effort {} failed: {}", label, e),
                }
            });
        }
        Err(_) => warn!("No async runtime available, dropping best-effort {}", label),
    }
}
