//! # Signal Host - Main Entry Point
//!
//! Frame-driven host for a small scene whose nodes talk through signal
//! subscription proxies. This entry point handles CLI parsing, configuration
//! loading, logging and the application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (600 frames)
//! signal_host
//!
//! # Run until Ctrl+C with a custom configuration
//! signal_host --config scene.toml --frames 0
//!
//! # Verbose JSON logs
//! signal_host --log-level trace --json-logs
//! ```
//!
//! ## Configuration
//!
//! The host loads configuration from a TOML file (default: `signal_host.toml`).
//! If the file doesn't exist, a default configuration will be created.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod scene;
mod signals;

pub use app::Application;
pub use cli::CliArgs;
pub use config::{AppConfig, HostSettings, LoggingSettings, SceneSettings, SchedulerSettings};
pub use scene::{Button, Health, Scene, SceneReport, Timer};

/// Parses arguments, sets up logging and runs the host to completion.
///
/// Must be called from a current-thread runtime: the scene's proxies are
/// `!Send` and live on the task driving the frame loop.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let mut logging_settings = AppConfig::load_from_file(&args.config_path)
        .await
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }

    logging::setup_logging(&logging_settings, args.json_logs)?;

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            return Err(e);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {e}");
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(max_frames: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.host.frame_interval_ms = 1;
        config.host.max_frames = max_frames;
        config.host.stats_interval_frames = 5;
        config.scene.timer_period_frames = 2;
        config.scene.button_period_frames = 7;
        config.scene.damage_per_hit = 50;
        config
    }

    #[tokio::test]
    async fn test_application_runs_configured_frames() {
        let app = Application::from_config(fast_config(12)).unwrap();
        let report = app.run_until(std::future::pending()).await.unwrap();

        assert_eq!(report.frames, 12);
        assert!(report.timeouts > 0);
        assert_eq!(report.presses, 1);
        assert_eq!(report.knockouts, 1);

        // Every native connection made during the run was released on shutdown.
        assert_eq!(
            report.proxies.native_registrations,
            report.proxies.native_unregistrations
        );
        assert_eq!(report.proxies.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_before_first_frame() {
        let app = Application::from_config(fast_config(0)).unwrap();
        let report = app.run_until(async {}).await.unwrap();

        assert_eq!(report.frames, 0);
        assert_eq!(report.timeouts, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = fast_config(10);
        config.host.frame_interval_ms = 0;
        assert!(Application::from_config(config).is_err());
    }

    #[tokio::test]
    async fn test_cli_overrides_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("host.toml");

        let args = CliArgs {
            config_path: config_path.clone(),
            frames: Some(42),
            frame_interval_ms: Some(5),
            log_level: Some("debug".to_string()),
            json_logs: true,
        };

        let app = Application::new(args).await.unwrap();
        assert!(config_path.exists());
        assert_eq!(app.config().host.max_frames, 42);
        assert_eq!(app.config().host.frame_interval_ms, 5);
        assert_eq!(app.config().logging.level, "debug");
        assert!(app.config().logging.json_format);
    }
}
