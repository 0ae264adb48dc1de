//! Periodic timeout and lost-contact scans.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::processor::{AlertDetector, ScanReport};

const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Timeout,
    LostContact,
}

impl Scan {
    fn name(&self) -> &'static str {
        match self {
            Scan::Timeout => "timeout",
            Scan::LostContact => "lost-contact",
        }
    }
}

/// Runs each scan behind its own non-reentrant guard.
#[derive(Clone)]
struct ScanRunner {
    detector: AlertDetector,
    timeout_guard: Arc<Mutex<()>>,
    lost_contact_guard: Arc<Mutex<()>>,
}

impl ScanRunner {
    /// Returns `None` when the previous run is still active or the scan failed.
    async fn run(&self, scan: Scan) -> Option<ScanReport> {
        let guard = match scan {
            Scan::Timeout => &self.timeout_guard,
            Scan::LostContact => &self.lost_contact_guard,
        };
        let _running = match guard.try_lock() {
            Ok(g) => g,
            Err(_) => {
                debug!("{} scan still running, skipping this firing", scan.name());
                return None;
            }
        };

        let result = match scan {
            Scan::Timeout => self.detector.check_timeout_alerts().await,
            Scan::LostContact => self.detector.check_lost_contact_alerts().await,
        };
        match result {
            Ok(report) => {
                if report.raised > 0 || report.failed > 0 {
                    info!(
                        "{} scan: {} activities, {} alerts raised, {} failed",
                        scan.name(),
                        report.activities,
                        report.raised,
                        report.failed
                    );
                }
                Some(report)
            }
            Err(e) => {
                error!("{} scan failed: {}", scan.name(), e);
                None
            }
        }
    }
}

/// Owns the two scan timers.
pub struct Scheduler {
    runner: ScanRunner,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns both timers. The first scans fire one `period` after start.
    pub fn start(detector: AlertDetector, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let runner = ScanRunner {
            detector,
            timeout_guard: Arc::new(Mutex::new(())),
            lost_contact_guard: Arc::new(Mutex::new(())),
        };
        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = [Scan::Timeout, Scan::LostContact]
            .into_iter()
            .map(|scan| tokio::spawn(run_timer(runner.clone(), scan, period, stop_rx.clone())))
            .collect();
        info!("Alert scans scheduled every {:?}", period);
        Self {
            runner,
            stop_tx,
            tasks,
        }
    }

    pub async fn run_timeout_scan_now(&self) -> Option<ScanReport> {
        self.runner.run(Scan::Timeout).await
    }

    pub async fn run_lost_contact_scan_now(&self) -> Option<ScanReport> {
        self.runner.run(Scan::LostContact).await
    }

    /// Stops both timers. Scans already in flight run to completion.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Scan timer task failed: {}", e);
            }
        }
        info!("Alert scans stopped");
    }
}

async fn run_timer(
    runner: ScanRunner,
    scan: Scan,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let runner = runner.clone();
                tokio::spawn(async move {
                    runner.run(scan).await;
                });
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    debug!("{} timer exiting", scan.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertType;
    use crate::processor::testing::Harness;

    #[tokio::test]
    async fn run_now_scans_and_reports() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:30:00");
        h.store.approve(7, 1);
        let mut scheduler = Scheduler::start(h.detector.clone(), Duration::from_secs(3600));

        let report = scheduler.run_lost_contact_scan_now().await.unwrap();
        assert_eq!(report.activities, 1);
        assert_eq!(report.raised, 1);
        let report = scheduler.run_timeout_scan_now().await.unwrap();
        assert_eq!(report.raised, 0);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn busy_scan_is_skipped() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:30:00");
        h.store.approve(7, 1);
        let mut scheduler = Scheduler::start(h.detector.clone(), Duration::from_secs(3600));

        {
            let _held = scheduler.runner.lost_contact_guard.try_lock().unwrap();
            assert!(scheduler.run_lost_contact_scan_now().await.is_none());
            // The other scan has its own guard.
            assert!(scheduler.run_timeout_scan_now().await.is_some());
        }
        assert!(h.store.alerts().is_empty());
        assert!(scheduler.run_lost_contact_scan_now().await.is_some());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn timers_fire_and_stop() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:30:00");
        h.store.approve(7, 1);
        let mut scheduler = Scheduler::start(h.detector.clone(), Duration::ZERO);

        let mut fired = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if h
                .store
                .alerts()
                .iter()
                .any(|a| a.alert_type == AlertType::LostContact)
            {
                fired = true;
                break;
            }
        }
        assert!(fired);

        scheduler.stop().await;
        assert!(scheduler.tasks.is_empty());
    }
}
