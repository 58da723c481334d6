// Deadline for external calls

use std::future::Future;
use std::time::Duration;

use crate::types::{AppError, AppResult};

/// Run `operation` under `limit`, turning an elapsed deadline into `AppError::Timeout`
pub async fn with_timeout<T, F>(limit: Duration, label: &str, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!("{} exceeded {:?}", label, limit))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_through_result() {
        let value = with_timeout(Duration::from_secs(1), "plan", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_timeout_error() {
        let err = with_timeout(Duration::from_millis(10), "search", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, AppError>(())
        })
        .await
        .unwrap_err();

        match err {
            AppError::Timeout(message) => assert!(message.starts_with("search exceeded")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
