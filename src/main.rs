//! エントリポイント
//!
//! 設定とゲイン成果物を読み込み、Ctrl-Cハンドラを設置して
//! 3アクターのグループを起動する。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use BigKahuna::application::run_supervised;
use BigKahuna::domain::{AppConfig, ControlGains, DomainResult};
use BigKahuna::infrastructure::{spawn_stdin_console, SimCameraAdapter, SimMotorAdapter};
use BigKahuna::logging::init_logging;

const CONFIG_PATH: &str = "config.toml";

fn main() {
    // 設定が読めない場合はデフォルトで起動する（ログ初期化後に警告）
    let (config, config_error) = match AppConfig::from_file(CONFIG_PATH) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let _guard = init_logging(&config.logging);

    if let Some(e) = config_error {
        warn!(error = %e, "Config file unavailable, using defaults");
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
    info!("Shutdown complete");
}

fn run(config: AppConfig) -> DomainResult<()> {
    config.validate()?;

    // ゲイン成果物の読み込み失敗は致命的（検証込み）
    let gains = ControlGains::load(&config.control.gains_path)?;
    info!(
        nx = gains.nx(),
        nu = gains.nu(),
        ny = gains.ny(),
        path = %config.control.gains_path,
        "Gain artifact loaded"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    }

    let camera = SimCameraAdapter::new(&config.camera);
    let motor = SimMotorAdapter::new();

    let (action_tx, action_rx) = crossbeam_channel::unbounded();
    let _input = spawn_stdin_console(action_tx);

    run_supervised(camera, motor, action_rx, config, gains, shutdown)
}
