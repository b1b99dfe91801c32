use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::ClientError;

/// Single absolute deadline covering one whole call: request, response
/// headers, and every chunk of a streaming body.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// The configured budget this deadline was started with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Runs `fut` until it completes or the deadline passes.
    ///
    /// On expiry `fut` is dropped, which cancels whatever it was awaiting.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ClientError>
    where
        F: Future,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| self.expired())
    }

    pub(crate) fn expired(&self) -> ClientError {
        ClientError::Timeout { after: self.budget }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let deadline = Deadline::start(Duration::from_secs(5));
        let value = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                7
            })
            .await
            .expect("in time");
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_surfaces_timeout() {
        let deadline = Deadline::start(Duration::from_millis(200));
        let err = deadline
            .run(std::future::pending::<()>())
            .await
            .expect_err("should time out");
        assert_eq!(
            err,
            ClientError::Timeout {
                after: Duration::from_millis(200)
            }
        );
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_shared_across_awaits() {
        let deadline = Deadline::start(Duration::from_secs(3));
        deadline
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await
            .expect("first await fits");
        let err = deadline
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await
            .expect_err("second await exceeds the remaining budget");
        assert!(matches!(err, ClientError::Timeout { .. }));
    }
}
