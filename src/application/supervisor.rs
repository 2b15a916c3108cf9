//! Supervisor: 3アクターの起動・監視・順序付きティアダウン
//!
//! 共有領域と停止フラグを確保し、知覚・コンソール・制御の3スレッドを
//! 名前付きで起動する。いずれかのスレッドが終了するか停止フラグが
//! 立ったら、残り全員に停止を伝播して固定順（知覚→コンソール→制御）
//! でjoinする。処理中のコマンドは破棄される。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{error, info, warn};

use crate::application::console::console_thread;
use crate::application::control::control_thread;
use crate::application::perception::perception_thread;
use crate::application::shared_state::SharedStateRegion;
use crate::domain::{
    AppConfig, CameraPort, ControlGains, DomainError, DomainResult, MotorPort, OperatorAction,
};

/// 監視ポーリング間隔
const SUPERVISION_POLL: Duration = Duration::from_millis(250);
/// ハートビート（frame_acquired）の停滞警告しきい値
const HEARTBEAT_STALE: Duration = Duration::from_secs(2);

/// 3アクターを起動し、最初の終了要因まで監視する
///
/// 戻り値は最初に観測したアクターのエラー（全員正常終了ならOk）。
/// Ctrl-C等の停止フラグ設置は呼び出し側の責務。
pub fn run_supervised<C, M>(
    camera: C,
    motor: M,
    actions: Receiver<OperatorAction>,
    config: AppConfig,
    gains: ControlGains,
    shutdown: Arc<AtomicBool>,
) -> DomainResult<()>
where
    C: CameraPort + 'static,
    M: MotorPort + 'static,
{
    let shared = Arc::new(SharedStateRegion::new(config.camera.marker_count));

    info!(
        markers = config.camera.marker_count,
        nx = gains.nx(),
        "Starting actor group"
    );

    let perception = {
        let shared = Arc::clone(&shared);
        let shutdown = Arc::clone(&shutdown);
        let camera_config = config.camera.clone();
        spawn_named("perception", move || {
            perception_thread(camera, shared, shutdown, camera_config)
        })?
    };

    let console = {
        let shared = Arc::clone(&shared);
        let shutdown = Arc::clone(&shutdown);
        spawn_named("console", move || {
            console_thread(actions, shared, shutdown)
        })?
    };

    let control = {
        let shared = Arc::clone(&shared);
        let shutdown = Arc::clone(&shutdown);
        let config = config.clone();
        spawn_named("control", move || {
            control_thread(motor, shared, shutdown, gains, config)
        })?
    };

    // 監視ループ: 停止要求かスレッド終了を待つ
    let mut last_heartbeat = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(SUPERVISION_POLL);

        if shared.frame_acquired.take() {
            last_heartbeat = Instant::now();
        } else if last_heartbeat.elapsed() > HEARTBEAT_STALE {
            warn!(
                stale_secs = last_heartbeat.elapsed().as_secs(),
                "Perception heartbeat stale"
            );
            last_heartbeat = Instant::now();
        }

        if perception.is_finished() || console.is_finished() || control.is_finished() {
            info!("Actor exit detected, shutting down group");
            break;
        }
    }

    // 停止伝播。制御スレッドは次のwaitタイムアウトで気付くが、
    // シグナルを一度鳴らして即時に起こす
    shutdown.store(true, Ordering::Relaxed);
    shared.measurement_ready.set();

    // 固定順のティアダウン: 知覚 → コンソール → 制御
    let mut first_error: Option<DomainError> = None;
    for (name, handle) in [
        ("perception", perception),
        ("console", console),
        ("control", control),
    ] {
        match handle.join() {
            Ok(Ok(())) => info!(thread = name, "Joined cleanly"),
            Ok(Err(e)) => {
                error!(thread = name, error = %e, "Actor exited with error");
                first_error.get_or_insert(e);
            }
            Err(_) => {
                error!(thread = name, "Actor panicked");
                first_error.get_or_insert(DomainError::Supervisor(format!(
                    "{} thread panicked",
                    name
                )));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// 名前付きスレッドの起動
fn spawn_named<F>(name: &str, body: F) -> DomainResult<JoinHandle<DomainResult<()>>>
where
    F: FnOnce() -> DomainResult<()> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| DomainError::Supervisor(format!("Failed to spawn {} thread: {}", name, e)))
}
