//! Deadline and cancellation for database calls

use std::future::Future;
use std::time::Duration;

use lodestone_common::{LodestoneError, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Bounds applied to every call made through a collection handle.
///
/// The default context is unlimited: calls wait as long as the driver and
/// server allow.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl OpContext {
    /// Unlimited context
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_unlimited(&self) -> bool {
        self.deadline.is_none() && self.cancel.is_none()
    }

    /// Drive `fut` to completion unless the deadline passes or the token fires first
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let guarded = async {
            match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(LodestoneError::Cancelled),
                    out = fut => out,
                },
                None => fut.await,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .map_err(|_| LodestoneError::Timeout("operation deadline exceeded".to_string()))?,
            None => guarded.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = OpContext::background();
        assert!(ctx.is_unlimited());
        let out = ctx.run(async { Ok::<_, LodestoneError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let ctx = OpContext::with_timeout(Duration::from_secs(5));
        let err = ctx
            .run(async { Err::<(), _>(LodestoneError::NotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, LodestoneError::NotFound));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let ctx = OpContext::with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, LodestoneError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LodestoneError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::background().cancel_on(token);
        let err = ctx
            .run(std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, LodestoneError::Cancelled));
    }
}
