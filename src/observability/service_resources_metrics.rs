use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;
use anyhow::{anyhow, Result};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::time::sleep;

const PROCESS_METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Samples this process' resource usage into the shared registry, forever.
pub async fn collect_process_metrics() -> Result<()> {
    let metrics = get_metrics().await;
    let mut sys = System::new();
    let pid = sysinfo::get_current_pid().map_err(|err| anyhow!("cannot resolve own pid: {}", err))?;

    let start_time_unix = now_i64();
    metrics.process_start_time.set(start_time_unix);

    loop {
        // Refresh just our process
        let pids = [pid];
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            false,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_exe(UpdateKind::OnlyIfNotSet),
        );

        if let Some(proc) = sys.process(pid) {
            // % over the last refresh interval
            metrics.process_cpu_usage.set(proc.cpu_usage().into());
            metrics.process_memory_usage.set(proc.memory() as i64);
            metrics.process_virtual_memory.set(proc.virtual_memory() as i64);

            #[cfg(target_family = "unix")]
            {
                use std::fs;
                if let Ok(entries) = fs::read_dir(format!("/proc/{}/fd", pid.as_u32())) {
                    metrics.process_open_fds.set(entries.count() as i64);
                }
            }

            metrics.process_uptime.set(now_i64() - start_time_unix);
        }

        sleep(PROCESS_METRICS_INTERVAL).await;
    }
}
