use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::error::PipelineError;
use crate::notify::{LocationReport, NotificationEngine};

/// スイープ1回分の結果
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub processed: Vec<LocationReport>,
    /// 処理に失敗した勤務地
    pub failed: Vec<String>,
}

impl SweepReport {
    pub fn locations(&self) -> usize {
        self.processed.len() + self.failed.len()
    }
}

/// 購読中の全勤務地を順番に処理する
#[derive(Clone)]
pub struct Sweeper {
    engine: NotificationEngine,
}

impl Sweeper {
    pub fn new(engine: NotificationEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &NotificationEngine {
        &self.engine
    }

    /// 全勤務地を1つずつ処理する
    ///
    /// 勤務地ごとのエラーはログに残して次へ進む。
    /// Err になるのは勤務地一覧を読み込めなかった場合のみ。
    pub async fn run_sweep(&self) -> Result<SweepReport, PipelineError> {
        let locations = self.engine.store().subscribed_locations().await?;
        info!("Starting sweep over {} locations", locations.len());

        let mut report = SweepReport::default();
        for location in locations {
            match self.engine.process_location(&location).await {
                Ok(location_report) => report.processed.push(location_report),
                Err(e) => {
                    error!(location = %location, error = %e, "Error processing location");
                    report.failed.push(location);
                }
            }
        }

        info!(
            "Sweep complete: {} locations processed, {} failed",
            report.processed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// 定期スイープを登録して開始する
pub async fn start_scheduler(sweeper: Sweeper, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async(schedule, move |_uuid, _lock| {
        let sweeper = sweeper.clone();
        Box::pin(async move {
            info!("Running scheduled job check...");
            if let Err(e) = sweeper.run_sweep().await {
                error!("Scheduled sweep failed: {}", e);
            }
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    info!("Scheduled sweep started ({})", schedule);
    Ok(scheduler)
}
