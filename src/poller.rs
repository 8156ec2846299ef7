use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{actions::Action, config::Config, status::StatusReport, utils::FetchError};

/// One call is one poll attempt.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn fetch(&self) -> Result<StatusReport, FetchError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error("maximum wait time exceeded for the status {status_name}")]
    DeadlineExceeded { status_name: String },

    #[error("action is cancelled: {reason} while waiting for the status {status_name}")]
    Cancelled {
        status_name: String,
        reason: &'static str,
    },
}

/// Cancellation token that remembers why it was cancelled. The first reason wins.
#[derive(Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    reason: Arc<OnceLock<&'static str>>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    pub fn cancel(&self, reason: &'static str) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn reason(&self) -> &'static str {
        self.reason.get().copied().unwrap_or("cancelled")
    }
}

fn round_to_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs_f64().round() as u64)
}

/// Waits for the configured status to turn `success` on the polled commit.
///
/// The first attempt is made as soon as [`Poller::run`] starts and the following ones
/// every `check_interval`. Request failures, undecodable bodies and a missing or
/// unfinished status only produce a warning; the session ends on success, when
/// `maximum_wait_time` has elapsed at the start of an attempt, or on cancellation.
pub struct Poller<'a, S> {
    source: &'a S,
    action: &'a Action,
    status_name: String,
    check_interval: Duration,
    maximum_wait_time: Duration,
}

impl<'a, S: StatusSource> Poller<'a, S> {
    pub fn new(source: &'a S, action: &'a Action, config: &Config) -> Poller<'a, S> {
        Poller {
            source,
            action,
            status_name: config.status_name.clone(),
            check_interval: config.check_interval,
            maximum_wait_time: config.maximum_wait_time,
        }
    }

    pub async fn run(&self, cancel: &Cancellation) -> Result<StatusReport, PollError> {
        let started_at = Instant::now();
        info!(
            status = %self.status_name,
            check_interval = %humantime::format_duration(self.check_interval),
            maximum_wait_time = %humantime::format_duration(self.maximum_wait_time),
            "waiting for status"
        );

        // First tick completes immediately.
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(cancel)),
                _ = ticker.tick() => {}
            }

            let elapsed = started_at.elapsed();
            if elapsed > self.maximum_wait_time {
                return Err(PollError::DeadlineExceeded {
                    status_name: self.status_name.clone(),
                });
            }

            attempt += 1;
            debug!(attempt, elapsed = ?elapsed, "checking status");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(cancel)),
                result = self.source.fetch() => result,
            };

            match result {
                Ok(report) if report.is_ready(&self.status_name) => {
                    info!(
                        attempt,
                        waited = %humantime::format_duration(round_to_secs(started_at.elapsed())),
                        "status {} is success",
                        self.status_name
                    );
                    return Ok(report);
                }
                Ok(report) => {
                    debug!(attempt, combined_state = %report.state, "status not ready");
                    self.retry_later("status not found or not success")
                }
                Err(FetchError::Decode(e)) => {
                    self.retry_later(&format!("error unmarshal response: {e}"))
                }
                Err(e) => self.retry_later(&format!("error making request: {e}")),
            }
        }
    }

    fn cancelled(&self, cancel: &Cancellation) -> PollError {
        let reason = cancel.reason();
        info!(status = %self.status_name, reason, "cancellation requested, giving up");
        PollError::Cancelled {
            status_name: self.status_name.clone(),
            reason,
        }
    }

    fn retry_later(&self, cause: &str) {
        let delay = humantime::format_duration(round_to_secs(self.check_interval));
        self.action
            .warning(&format!("{cause}, we'll try again later after {delay}..."));
    }
}
