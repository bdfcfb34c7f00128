use std::future::Future;
use std::time::Duration;

use domains::{DomainError, Result};
use tracing::warn;

/// Upper bound on a single store call. A call that overruns fails with
/// [`DomainError::Unavailable`] instead of holding the request open.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, limit_ms = self.limit.as_millis() as u64, "store call timed out");
                Err(DomainError::Unavailable(format!(
                    "{operation} did not complete within {}ms",
                    self.limit.as_millis()
                )))
            }
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
