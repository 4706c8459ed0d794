//! Cancellation and deadline propagation for I/O operations.

use crate::traits::{StorageError, StorageResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation signal and optional deadline.
///
/// Cloning shares the same token; [`IoContext::child`] derives a token that is
/// cancelled with its parent but can also be cancelled on its own.
#[derive(Debug, Clone)]
pub struct IoContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for IoContext {
    fn default() -> Self {
        Self::background()
    }
}

impl IoContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        IoContext {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        IoContext {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context cancelled together with `self`. The tighter deadline wins.
    pub fn child(&self) -> Self {
        IoContext {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child with an additional timeout.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        IoContext {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail fast if the context is already done.
    pub fn check(&self, operation: &'static str, location: &str) -> StorageResult<()> {
        if self.token.is_cancelled() {
            return Err(StorageError::Cancelled {
                operation,
                location: location.to_string(),
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(StorageError::DeadlineExceeded {
                    operation,
                    location: location.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drive `fut` until it completes, the token is cancelled, or the deadline passes.
    ///
    /// On cancellation or timeout `fut` is dropped, which releases whatever it held.
    pub async fn run<F, T>(&self, operation: &'static str, location: &str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        self.check(operation, location)?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(StorageError::Cancelled {
                operation,
                location: location.to_string(),
            }),
            _ = deadline => Err(StorageError::DeadlineExceeded {
                operation,
                location: location.to_string(),
            }),
            result = fut => result,
        }
    }
}
