use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::connector::{Connector, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Once,
    Every(Duration),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub runs: usize,
    pub failures: usize,
}

/// Drive `connector` on `schedule`, one run at a time.
///
/// Each run is awaited before the next tick is considered and missed ticks
/// are skipped, so runs never overlap. `shutdown` is only observed between
/// runs. `first_mode` is kept until a run succeeds; every later run is
/// incremental.
pub async fn run_schedule<C, F>(
    connector: &C,
    first_mode: RunMode,
    schedule: Schedule,
    shutdown: F,
) -> ScheduleSummary
where
    C: Connector + ?Sized,
    F: Future<Output = ()>,
{
    let mut summary = ScheduleSummary::default();
    let mut mode = first_mode;

    let period = match schedule {
        Schedule::Once => {
            run_once(connector, mode, &mut summary).await;
            return summary;
        }
        Schedule::Every(period) => period,
    };

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping schedule");
                break;
            }
            _ = ticker.tick() => {}
        }

        if run_once(connector, mode, &mut summary).await {
            mode = RunMode::Incremental;
        }
    }

    summary
}

async fn run_once<C>(connector: &C, mode: RunMode, summary: &mut ScheduleSummary) -> bool
where
    C: Connector + ?Sized,
{
    summary.runs += 1;
    match connector.sync(mode).await {
        Ok(result) => {
            tracing::info!(
                source = %result.source,
                run_id = %result.run_id,
                mode = %result.mode,
                fetched = result.fetched,
                upserted = result.upserted,
                "sync completed"
            );
            true
        }
        Err(e) => {
            summary.failures += 1;
            tracing::error!(source = connector.source_name(), error = %e, "sync failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::SyncResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records each requested mode; fails the calls whose index is listed.
    struct FakeConnector {
        modes: Mutex<Vec<RunMode>>,
        fail_calls: Vec<usize>,
    }

    impl FakeConnector {
        fn new(fail_calls: Vec<usize>) -> Self {
            Self {
                modes: Mutex::new(Vec::new()),
                fail_calls,
            }
        }

        fn modes(&self) -> Vec<RunMode> {
            self.modes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        fn source_name(&self) -> &str {
            "fake"
        }

        async fn sync(
            &self,
            mode: RunMode,
        ) -> Result<SyncResult, Box<dyn std::error::Error + Send + Sync>> {
            let call = {
                let mut modes = self.modes.lock().unwrap();
                modes.push(mode);
                modes.len() - 1
            };
            if self.fail_calls.contains(&call) {
                return Err("HTTP 503 on page 1: unavailable".into());
            }
            Ok(SyncResult {
                source: "fake".to_string(),
                run_id: Uuid::new_v4(),
                mode,
                watermark: None,
                fetched: 0,
                upserted: 0,
            })
        }
    }

    #[tokio::test]
    async fn once_runs_a_single_time() {
        let connector = FakeConnector::new(vec![]);
        let summary = run_schedule(
            &connector,
            RunMode::FirstRun,
            Schedule::Once,
            std::future::pending(),
        )
        .await;

        assert_eq!(summary, ScheduleSummary { runs: 1, failures: 0 });
        assert_eq!(connector.modes(), vec![RunMode::FirstRun]);
    }

    #[tokio::test]
    async fn once_reports_failure() {
        let connector = FakeConnector::new(vec![0]);
        let summary = run_schedule(
            &connector,
            RunMode::Incremental,
            Schedule::Once,
            std::future::pending(),
        )
        .await;

        assert_eq!(summary, ScheduleSummary { runs: 1, failures: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_until_shutdown_then_goes_incremental() {
        let connector = FakeConnector::new(vec![]);
        let hour = Duration::from_secs(3600);
        let shutdown = tokio::time::sleep(hour * 2 + hour / 2);

        let summary = run_schedule(
            &connector,
            RunMode::FirstRun,
            Schedule::Every(hour),
            shutdown,
        )
        .await;

        assert_eq!(summary, ScheduleSummary { runs: 3, failures: 0 });
        assert_eq!(
            connector.modes(),
            vec![RunMode::FirstRun, RunMode::Incremental, RunMode::Incremental]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_run_is_retried_as_first_run() {
        let connector = FakeConnector::new(vec![0]);
        let hour = Duration::from_secs(3600);
        let shutdown = tokio::time::sleep(hour * 2 + hour / 2);

        let summary = run_schedule(
            &connector,
            RunMode::FirstRun,
            Schedule::Every(hour),
            shutdown,
        )
        .await;

        assert_eq!(summary, ScheduleSummary { runs: 3, failures: 1 });
        assert_eq!(
            connector.modes(),
            vec![RunMode::FirstRun, RunMode::FirstRun, RunMode::Incremental]
        );
    }
}
