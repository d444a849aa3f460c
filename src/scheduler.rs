use std::future::Future;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// `now` 之后第一次到达 `at` 的时刻（严格晚于 `now`）
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    loop {
        let naive = date.and_time(at);
        // 夏令时跳过的时刻顺延一小时
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest());
        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => return now.clone(),
        }
    }
}

/// 每天在 `at`（本地时间）执行一次 `job`，直到 `shutdown` 被取消。
/// `run_now` 为 true 时先立即执行一次。
pub async fn run_daily<F, Fut>(at: NaiveTime, run_now: bool, shutdown: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("定时任务已设置，将在每天 {} 执行", at.format("%H:%M"));

    if run_now {
        info!("立即执行测试任务...");
        job().await;
    }

    loop {
        let now = Local::now();
        let next = next_run_after(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!("下次执行时间: {}", next.format("%Y-%m-%d %H:%M:%S"));

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("定时任务调度器已停止");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        info!("=== 定时任务开始执行 [{}] ===", Local::now().format("%Y-%m-%d %H:%M:%S"));
        job().await;
    }
}
