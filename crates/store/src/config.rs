use std::future::Future;
use std::time::Duration;

use crate::{Result, StoreError};

/// Settings shared by every store implementation.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Deadline applied to each individual store operation.
    pub operation_timeout: Duration,
}

impl StoreConfig {
    pub fn with_timeout(operation_timeout: Duration) -> Self {
        Self { operation_timeout }
    }

    /// Runs `fut` under the operation deadline.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.operation_timeout, "store operation timed out");
                Err(StoreError::Timeout {
                    operation,
                    after: self.operation_timeout,
                })
            }
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_passes_result_through() {
        let config = StoreConfig::default();
        let value = config.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn run_times_out() {
        let config = StoreConfig::with_timeout(Duration::from_millis(10));
        let result: Result<()> = config
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(StoreError::Timeout {
                operation: "slow",
                ..
            })
        ));
    }
}
