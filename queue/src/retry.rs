use std::time::Duration;
use tokio::time::sleep;
use domains::errors::PublishError;
use crate::publisher::Publisher;
use log::warn;


/// How many times a message is offered to a queue and how long to wait
/// between attempts. Only transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {

    /// The total number of attempts, including the first one. One means
    /// a failed message is dropped straight away.
    pub max_attempts: u32,

    /// How long to wait before the first retry. Each retry after that
    /// waits twice as long as the one before.
    pub base_delay: Duration,

    /// The longest wait between two attempts
    pub max_delay: Duration,

}

impl Default for RetryPolicy {

    fn default() -> RetryPolicy {

        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }

    }

}

impl RetryPolicy {

    /// The wait before the given retry (1 for the first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {

        let factor = 2u32.saturating_pow(retry.saturating_sub(1));

        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))

    }

}


/// Send a message, retrying transient failures as the policy allows.
/// Returns the number of attempts it took. A fatal failure is returned
/// straight away, as is the last transient failure once the attempts
/// run out.
pub async fn send_with_retry(
    publisher: &dyn Publisher,
    message_body: &str,
    policy: &RetryPolicy
) -> Result<u32, PublishError> {

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {

        match publisher.send(message_body).await {

            Ok(_) => return Ok(attempt),

            Err(error) if error.is_transient() && attempt < max_attempts => {

                let delay = policy.delay_for(attempt);

                warn!(
                    target: "queue",
                    "Attempt {} of {} to send to {} failed kind={}: {}. Retrying in {:?}.",
                    attempt, max_attempts, publisher.queue_name(), error.kind(), error, delay
                );

                sleep(delay).await;
                attempt += 1;

            },

            Err(error) => return Err(error),

        }

    }

}
