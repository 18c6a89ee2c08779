//! Main application logic and lifecycle management.
//!
//! The `Application` owns the validated configuration and drives the frame
//! loop: advance the scene, drain the deferred queue, report, repeat.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    scene::{Scene, SceneReport},
    signals::wait_for_shutdown,
};
use signal_proxy::FrameScheduler;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Main application struct.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
}

impl Application {
    /// Creates a new application from command-line arguments.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(frames) = args.frames {
            config.host.max_frames = frames;
        }

        if let Some(interval) = args.frame_interval_ms {
            config.host.frame_interval_ms = interval;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        let app = Self::from_config(config)?;
        display_banner();
        Ok(app)
    }

    /// Creates an application from an already-assembled configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs until the frame limit or an OS shutdown signal.
    pub async fn run(self) -> Result<SceneReport, Box<dyn std::error::Error>> {
        self.run_until(async {
            if let Err(e) = wait_for_shutdown().await {
                error!("❌ Failed to install shutdown signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the frame loop until `shutdown` resolves or the frame limit is hit.
    pub async fn run_until<F>(self, shutdown: F) -> Result<SceneReport, Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        let host = &self.config.host;
        let scheduler = FrameScheduler::with_config(self.config.to_scheduler_config());
        let mut scene = Scene::new(&self.config.scene, scheduler.clone())?;

        self.log_configuration_summary();

        let mut interval = tokio::time::interval(Duration::from_millis(host.frame_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("✅ Signal host is now running");
        if host.max_frames == 0 {
            info!("🛑 Press Ctrl+C to stop");
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested at frame {}", scene.frame());
                    break;
                }
                _ = interval.tick() => {
                    scene.update()?;
                    scheduler.run_frame();

                    let frame = scene.frame();
                    if host.stats_interval_frames > 0 && frame % host.stats_interval_frames == 0 {
                        log_periodic_statistics(&scene.report(), scheduler.pending());
                    }
                    if host.max_frames > 0 && frame >= host.max_frames {
                        info!("🏁 Reached frame limit ({})", host.max_frames);
                        break;
                    }
                }
            }
        }

        let released = scene.shutdown();
        let dropped = scheduler.clear();
        let report = scene.report();
        info!("🧹 Released {} signal(s), dropped {} pending deferred task(s)", released, dropped);
        log_final_statistics(&report);

        Ok(report)
    }

    fn log_configuration_summary(&self) {
        let config = &self.config;
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Frame interval: {}ms", config.host.frame_interval_ms);
        info!(
            "  🎞️ Frame limit: {}",
            match config.host.max_frames {
                0 => "none".to_string(),
                n => n.to_string(),
            }
        );
        info!(
            "  📬 Deferred budget: {}",
            match config.scheduler.max_tasks_per_frame {
                0 => "unlimited".to_string(),
                n => format!("{n} per frame"),
            }
        );
        info!(
            "  🧩 Timer every {} frames, button every {} frames",
            config.scene.timer_period_frames, config.scene.button_period_frames
        );
    }
}

fn log_periodic_statistics(report: &SceneReport, pending: usize) {
    info!(
        "📊 Frame {} | {} dispatches | {} invocations | {} deferred | {} pending",
        report.frames,
        report.proxies.dispatches,
        report.proxies.invocations,
        report.proxies.deferred_scheduled,
        pending
    );
}

/// Logs final statistics during shutdown.
fn log_final_statistics(report: &SceneReport) {
    info!("📊 Final Statistics:");
    info!("  - Frames: {}", report.frames);
    info!(
        "  - Timeouts: {} | Knockouts: {} | Respawns: {}",
        report.timeouts, report.knockouts, report.respawns
    );
    info!("  - Button presses: {} | Toggles: {}", report.presses, report.toggles);
    info!(
        "  - Native registrations: {} | unregistrations: {}",
        report.proxies.native_registrations, report.proxies.native_unregistrations
    );
    if let Ok(json) = serde_json::to_string(&report.proxies) {
        info!("  - Proxy counters: {}", json);
    }
}
