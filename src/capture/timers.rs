use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::CaptureEngine;
use super::screenshot::CaptureTarget;
use super::state::CaptureOutcome;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Cancellation handles for the timers of one capture run. Periodic capture
/// and idle detection hang off the run token, so cancelling the run disarms
/// everything at once.
#[derive(Debug, Default)]
pub struct RunTimers {
    run: Option<CancellationToken>,
    periodic: Option<CancellationToken>,
    idle: Option<CancellationToken>,
}

impl RunTimers {
    /// Cancels whatever was armed and opens a fresh run.
    pub fn arm_run(&mut self) -> CancellationToken {
        self.cancel_all();
        let token = CancellationToken::new();
        self.run = Some(token.clone());
        token
    }

    /// Swaps in a new periodic-capture token. `None` when no run is armed.
    pub fn replace_periodic(&mut self) -> Option<CancellationToken> {
        self.cancel_periodic();
        let token = self.run.as_ref()?.child_token();
        self.periodic = Some(token.clone());
        Some(token)
    }

    pub fn cancel_periodic(&mut self) {
        if let Some(token) = self.periodic.take() {
            token.cancel();
        }
    }

    pub fn periodic_armed(&self) -> bool {
        self.periodic.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    pub fn replace_idle(&mut self) -> Option<CancellationToken> {
        if let Some(token) = self.idle.take() {
            token.cancel();
        }
        let token = self.run.as_ref()?.child_token();
        self.idle = Some(token.clone());
        Some(token)
    }

    pub fn cancel_all(&mut self) {
        for token in [self.periodic.take(), self.idle.take(), self.run.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }
}

pub async fn periodic_capture_loop(
    engine: CaptureEngine,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                match engine.capture(CaptureTarget::Screen).await {
                    CaptureOutcome::Inactive | CaptureOutcome::CapReached => break,
                    _ => {}
                }
            }
        }
    }
}

pub async fn flush_loop(engine: CaptureEngine, period: Duration, cancel_token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("flush loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                engine.flush().await;
            }
        }
    }
}

/// Fires once after `timeout` unless cancelled by a newer interaction.
pub async fn idle_watch(
    engine: CaptureEngine,
    timeout: Duration,
    run: u64,
    cancel_token: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {}
        _ = time::sleep(timeout) => engine.enter_idle(run),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_the_run_disarms_children() {
        let mut timers = RunTimers::default();
        assert!(timers.replace_periodic().is_none());

        let run = timers.arm_run();
        let periodic = timers.replace_periodic().unwrap();
        let idle = timers.replace_idle().unwrap();
        assert!(timers.periodic_armed());

        run.cancel();
        assert!(periodic.is_cancelled());
        assert!(idle.is_cancelled());
        assert!(!timers.periodic_armed());
    }

    #[test]
    fn replacing_idle_cancels_previous() {
        let mut timers = RunTimers::default();
        timers.arm_run();
        let first = timers.replace_idle().unwrap();
        let second = timers.replace_idle().unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        timers.cancel_all();
        assert!(second.is_cancelled());
    }
}
