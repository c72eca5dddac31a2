//! Bounded-concurrency dispatch of model requests
//!
//! At most `max_concurrent` requests are in flight, and no more than
//! `rate_limit` dispatches start inside any rolling `rate_window_ms`.
//! Retryable failures back off exponentially; everything else fails fast.

use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::client::{ModelClient, ModelRequest, ModelResponse};
use crate::config::QueueConfig;
use crate::error::{PipelineError, RequestError};

pub struct RequestQueue {
    client: Arc<dyn ModelClient>,
    config: QueueConfig,
    permits: Semaphore,
    dispatched: Mutex<VecDeque<Instant>>,
    shutdown: watch::Sender<bool>,
}

impl RequestQueue {
    pub fn new(client: Arc<dyn ModelClient>, config: QueueConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            permits: Semaphore::new(config.max_concurrent.max(1)),
            client,
            config,
            dispatched: Mutex::new(VecDeque::new()),
            shutdown,
        }
    }

    /// Stop accepting work and cancel in-flight requests at their next await
    pub fn shutdown(&self) {
        debug!("Request queue shutting down");
        self.shutdown.send_replace(true);
        self.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run one request through the concurrency gate, with retries
    pub async fn submit(&self, request: ModelRequest) -> Result<ModelResponse, PipelineError> {
        let mut signal = self.shutdown.subscribe();
        if *signal.borrow_and_update() {
            return Err(cancelled(0));
        }

        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut signal) => Err(cancelled(0)),
            result = self.run_with_retry(&request) => result,
        }
    }

    /// Submit every request; results come back in input order
    pub async fn submit_all(
        &self,
        requests: Vec<ModelRequest>,
    ) -> Vec<Result<ModelResponse, PipelineError>> {
        join_all(requests.into_iter().map(|request| self.submit(request))).await
    }

    async fn run_with_retry(&self, request: &ModelRequest) -> Result<ModelResponse, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| cancelled(attempt - 1))?;
                self.wait_for_rate_slot().await;
                self.client.complete(request).await
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt <= self.config.max_retries => {
                    let delay = self.backoff(attempt, &err);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying model request"
                    );
                    sleep(delay).await;
                }
                Err(source) => {
                    return Err(PipelineError::Request {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    /// `base × 2^(attempt-1)`, stretched for rate limits, capped at `max_delay_ms`
    ///
    /// A server `retry-after` is honored up to `max_retry_after_ms`.
    fn backoff(&self, attempt: u32, err: &RequestError) -> Duration {
        let cap = Duration::from_millis(self.config.max_delay_ms);
        if let RequestError::RateLimited {
            retry_after: Some(wait),
        } = err
        {
            let ceiling = self.config.max_retry_after_ms.max(self.config.max_delay_ms);
            return (*wait).min(Duration::from_millis(ceiling));
        }

        let exponent = attempt.saturating_sub(1).min(30);
        let mut delay = self.config.base_delay_ms.saturating_mul(1u64 << exponent);
        if matches!(err, RequestError::RateLimited { .. }) {
            delay = delay.saturating_mul(self.config.rate_limit_backoff_multiplier.max(1) as u64);
        }
        Duration::from_millis(delay).min(cap)
    }

    async fn wait_for_rate_slot(&self) {
        if self.config.rate_limit == 0 {
            return;
        }
        let window = Duration::from_millis(self.config.rate_window_ms);

        loop {
            let wait = {
                let mut dispatched = self.dispatched.lock().await;
                let now = Instant::now();
                while dispatched
                    .front()
                    .is_some_and(|started| now.duration_since(*started) >= window)
                {
                    dispatched.pop_front();
                }
                if dispatched.len() < self.config.rate_limit {
                    dispatched.push_back(now);
                    return;
                }
                match dispatched.front() {
                    Some(oldest) => window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "Rate window full");
            sleep(wait).await;
        }
    }
}

fn cancelled(attempts: u32) -> PipelineError {
    PipelineError::Request {
        attempts,
        source: RequestError::Cancelled,
    }
}

async fn wait_for_shutdown(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
