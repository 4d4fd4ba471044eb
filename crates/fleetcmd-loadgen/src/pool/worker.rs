use crate::{client::CommandClient, config::LoadgenConfig, pacer::Pacer};
use fleetcmd_core::{
    Timestamp, TransportError, build,
    telemetry::{
        decrement_workers_active, increment_request_errors, increment_requests_sent,
        increment_workers_active, record_round_trip,
    },
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Why a worker stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The shared cancellation token fired.
    Cancelled,
    /// A command could not be delivered or its acknowledgement could not be
    /// read.
    Failed(TransportError),
    /// The worker task panicked.
    Panicked(String),
}

/// Final state of one worker, handed back to the pool.
#[derive(Clone, Debug)]
pub struct WorkerReport {
    /// 1-based slot number.
    pub worker_id: usize,
    pub identity: String,
    /// Requests whose acknowledgement decoded successfully.
    pub acknowledged: u64,
    pub exit: WorkerExit,
}

impl WorkerReport {
    pub const fn is_failure(&self) -> bool {
        !matches!(self.exit, WorkerExit::Cancelled)
    }

    pub const fn error(&self) -> Option<&TransportError> {
        match &self.exit {
            WorkerExit::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Holds one slot of the `workers_active` gauge until dropped, including
/// during unwinding.
struct ActiveGuard {
    release: fn(),
}

impl ActiveGuard {
    fn enter(acquire: fn(), release: fn()) -> Self {
        acquire();
        Self { release }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        (self.release)();
    }
}

/// Worker task simulating one vehicle.
///
/// On every pacer tick the worker builds a command envelope for `identity`,
/// sends it with `client` and waits for the acknowledgement before waiting for
/// the next tick, so a worker never has two requests in flight.
///
/// The loop ends on the first [`TransportError`] or when `cancel` fires. A
/// request still in flight at cancellation is abandoned.
///
/// # Arguments
///
/// - `worker_id`: 1-based slot number, used in logs.
/// - `identity`: the VIN this worker sends for its whole lifetime.
/// - `client`: this worker's own HTTP client.
/// - `config`: shared read-only settings (rate, version, command, timestamps).
/// - `cancel`: pool-wide shutdown token.
pub async fn worker_loop(
    worker_id: usize,
    identity: String,
    client: CommandClient,
    config: Arc<LoadgenConfig>,
    cancel: CancellationToken,
) -> WorkerReport {
    tracing::debug!(worker = worker_id, vin = %identity, "Worker started");
    let active = ActiveGuard::enter(increment_workers_active, decrement_workers_active);

    let mut pacer = Pacer::new(config.period);
    let mut acknowledged = 0_u64;

    let exit = loop {
        let ticked = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            at = pacer.tick() => Some(at),
        };
        let Some(_) = ticked else {
            break WorkerExit::Cancelled;
        };

        let envelope = build(
            &identity,
            &config.protocol_version,
            &config.command,
            Timestamp::now(config.timestamp_mode),
        );
        increment_requests_sent();

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = client.send(&envelope) => Some(result),
        };
        let Some(result) = sent else {
            tracing::debug!(worker = worker_id, vin = %identity, "Abandoned in-flight request");
            break WorkerExit::Cancelled;
        };

        match result {
            Ok(delivery) => {
                acknowledged += 1;
                let round_trip_ms = delivery.round_trip.as_secs_f64() * 1_000.0;
                record_round_trip(round_trip_ms);
                tracing::info!(
                    worker = worker_id,
                    vin = %identity,
                    url = %delivery.url,
                    status = delivery.status,
                    ack = %delivery.ack.status,
                    received_at = %delivery.ack.received_at(),
                    round_trip_ms,
                    "Command acknowledged"
                );
            }
            Err(err) => {
                increment_request_errors(err.kind());
                tracing::error!(
                    worker = worker_id,
                    vin = %identity,
                    url = err.url(),
                    kind = err.kind(),
                    error = %err,
                    "Worker stopping after transport error"
                );
                break WorkerExit::Failed(err);
            }
        }
    };

    drop(active);
    tracing::debug!(worker = worker_id, vin = %identity, acknowledged, "Worker stopped");

    WorkerReport {
        worker_id,
        identity,
        acknowledged,
        exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn config(rate: f64) -> Arc<LoadgenConfig> {
        let rate = format!("--rate={rate}");
        Arc::new(LoadgenConfig::from_args(["fleetcmd-loadgen", rate.as_str()]).unwrap())
    }

    fn client() -> CommandClient {
        // Port 9 (discard) on loopback; no request is ever issued in these tests.
        CommandClient::new("http://127.0.0.1:9", None).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_tick_sends_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = worker_loop(3, "12345678".into(), client(), config(1.0), cancel).await;

        assert_eq!(report.worker_id, 3);
        assert_eq!(report.identity, "12345678");
        assert_eq!(report.acknowledged, 0);
        assert_eq!(report.exit, WorkerExit::Cancelled);
        assert!(!report.is_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_pacer_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let report = worker_loop(1, "87654321".into(), client(), config(0.5), cancel).await;

        assert_eq!(report.exit, WorkerExit::Cancelled);
        assert_eq!(report.acknowledged, 0);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn active_slot_is_released_when_the_worker_unwinds() {
        use std::sync::atomic::{AtomicI64, Ordering};

        static ACTIVE: AtomicI64 = AtomicI64::new(0);
        fn acquire() {
            ACTIVE.fetch_add(1, Ordering::SeqCst);
        }
        fn release() {
            ACTIVE.fetch_sub(1, Ordering::SeqCst);
        }

        let outcome = std::panic::catch_unwind(|| {
            let _active = ActiveGuard::enter(acquire, release);
            if ACTIVE.load(Ordering::SeqCst) == 1 {
                panic!("worker body failed");
            }
        });

        assert!(outcome.is_err());
        assert_eq!(ACTIVE.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_report_exposes_its_error() {
        let err = TransportError::Connect {
            url: "http://127.0.0.1:9/v1.0/1/openDoor".into(),
            reason: "refused".into(),
        };
        let report = WorkerReport {
            worker_id: 1,
            identity: "1".into(),
            acknowledged: 4,
            exit: WorkerExit::Failed(err.clone()),
        };

        assert!(report.is_failure());
        assert_eq!(report.error(), Some(&err));
    }
}
