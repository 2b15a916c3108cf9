//! 制御アクター
//!
//! `measurement_ready`にペースを委ねる唯一のアクター。
//! ステップごとにLuenbergerオブザーバを無条件更新し、裁定済みモードに
//! 応じた指令を計算してモーターへ送る。オブザーバ状態はモード切替を
//! 跨いで連続であり、リセットされることはない。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::application::shared_state::{CommandUpdate, SharedStateRegion};
use crate::application::stats::LoopStats;
use crate::domain::{
    AppConfig, ControlGains, ControlMode, DomainError, DomainResult, MotorConfig, MotorPort,
};

/// measurement_ready待ちのタイムアウト（shutdown確認を兼ねる）
const MEASUREMENT_WAIT: Duration = Duration::from_millis(100);

/// Luenbergerオブザーバ
///
/// x̂ ← A·x̂ + B·u_prev + L·(y − C·x̂)
///
/// 構築時にゼロで初期化され、以後リセットAPIを持たない。
/// モード切替時も推定は連続する。
pub struct StateObserver {
    x_hat: DVector<f64>,
}

impl StateObserver {
    pub fn new(nx: usize) -> Self {
        Self {
            x_hat: DVector::zeros(nx),
        }
    }

    /// 観測yと直前の到達入力u_prevで推定を1ステップ進める
    pub fn update(&mut self, gains: &ControlGains, y: &DVector<f64>, u_prev: &DVector<f64>) {
        let innovation = y - &gains.c * &self.x_hat;
        self.x_hat = &gains.a * &self.x_hat + &gains.b * u_prev + &gains.l * innovation;
    }

    pub fn x_hat(&self) -> &DVector<f64> {
        &self.x_hat
    }
}

/// 閉ループ指令 u = G·r − K·x̂
pub fn closed_loop_command(
    gains: &ControlGains,
    reference: [f64; 2],
    x_hat: &DVector<f64>,
) -> [f64; 2] {
    let r = DVector::from_column_slice(&reference);
    let u = &gains.g * r - &gains.k * x_hat;
    [u[0], u[1]]
}

/// 指令の一次ローパスフィルタ
///
/// 離散一次遅れ: y ← y + α·(u − y)、α = Ts / (τ + Ts)、τ = 1/(2π·fc)。
/// 初回は入力を素通しして状態を初期化する。
pub struct CommandFilter {
    alpha: f64,
    state: Option<[f64; 2]>,
}

impl CommandFilter {
    pub fn new(cutoff_hz: f64, period_sec: f64) -> Self {
        let tau = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        Self {
            alpha: period_sec / (tau + period_sec),
            state: None,
        }
    }

    pub fn apply(&mut self, input: [f64; 2]) -> [f64; 2] {
        let prev = self.state.unwrap_or(input);
        let out = [
            prev[0] + self.alpha * (input[0] - prev[0]),
            prev[1] + self.alpha * (input[1] - prev[1]),
        ];
        self.state = Some(out);
        out
    }
}

/// 制御ループが実際に適用するモードと参照値
///
/// updatePendingの消費時のみ更新され、それ以外のステップでは
/// 前回適用した値を使い続ける。
pub struct ArbitratedCommand {
    pub mode: ControlMode,
    pub open_loop_ref: [f64; 2],
    pub closed_loop_ref: [f64; 2],
}

impl ArbitratedCommand {
    pub fn new() -> Self {
        Self {
            mode: ControlMode::default(),
            open_loop_ref: [0.0; 2],
            closed_loop_ref: [0.0; 2],
        }
    }

    /// 消費したコマンド更新を取り込む
    pub fn absorb(&mut self, update: CommandUpdate) {
        if update.mode != self.mode {
            info!(
                from = self.mode.label(),
                to = update.mode.label(),
                "Control mode switched"
            );
        }
        self.mode = update.mode;
        self.open_loop_ref = update.open_loop_ref;
        self.closed_loop_ref = update.closed_loop_ref;
    }

    /// 現在のモードに対応する参照値
    pub fn reference(&self) -> [f64; 2] {
        match self.mode {
            ControlMode::OpenLoop => self.open_loop_ref,
            ControlMode::ClosedLoop => self.closed_loop_ref,
        }
    }
}

impl Default for ArbitratedCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// 有限回の再試行付きドライバオープン
///
/// 上限を超えたら致命的エラーを返す（無限リトライはしない）。
pub fn open_motors_with_retry<M: MotorPort>(
    motor: &mut M,
    config: &MotorConfig,
) -> DomainResult<()> {
    for attempt in 1..=config.open_retry_limit {
        match motor.open() {
            Ok(()) => {
                info!(attempt, "Motor driver opened");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    attempt,
                    limit = config.open_retry_limit,
                    error = %e,
                    "Motor open failed, retrying"
                );
                std::thread::sleep(config.open_retry_delay());
            }
        }
    }
    Err(DomainError::Motor(format!(
        "Driver open failed after {} attempts",
        config.open_retry_limit
    )))
}

/// 制御対象2軸の指令を4軸の角度列に合成する
///
/// 軸0,2が制御対象で原点角度にオフセットを加算、軸1,3は原点角度で
/// 固定保持する。
fn compose_angles(command: [f64; 2], home: &[f64; 4]) -> [f64; 4] {
    [
        command[0] + home[0],
        home[1],
        command[1] + home[2],
        home[3],
    ]
}

/// 制御スレッドの本体
///
/// 起動時にドライバを開いて原点角度へ送り、以後は
/// `measurement_ready`の消費ごとに1ステップを実行する。
/// アクチュエータ往復の失敗はステップ内で記録して継続する（推定は
/// 直前の既知u_prevで既に実行済み）。
pub fn control_thread<M: MotorPort>(
    mut motor: M,
    shared: Arc<SharedStateRegion>,
    shutdown: Arc<AtomicBool>,
    gains: ControlGains,
    config: AppConfig,
) -> DomainResult<()> {
    info!("Control thread started");

    let ny = gains.ny();
    if shared.read_markers().len() != ny {
        return Err(DomainError::Gains(format!(
            "Output dimension mismatch: gains expect ny={}, shared region holds {}",
            ny,
            shared.read_markers().len()
        )));
    }

    open_motors_with_retry(&mut motor, &config.motors)?;
    let home = config.motors.home_angles;
    motor.send_angles(&home)?;
    info!(home = ?home, "Motors homed");

    let mut observer = StateObserver::new(gains.nx());
    let mut command = ArbitratedCommand::new();
    let mut filter = config.control.command_filter.enabled.then(|| {
        CommandFilter::new(
            config.control.command_filter.cutoff_hz,
            1.0 / config.camera.frame_rate_hz,
        )
    });
    let mut stats = LoopStats::new(config.control.stats_interval());
    let mut u_prev = DVector::zeros(gains.nu());
    let mut last_step: Option<Instant> = None;

    while !shutdown.load(Ordering::Relaxed) {
        if !shared.measurement_ready.wait_timeout(MEASUREMENT_WAIT) {
            continue;
        }
        if !shared.is_armed() {
            // 非アーム: 推定も指令も行わない
            continue;
        }

        let now = Instant::now();
        if let Some(prev) = last_step {
            stats.record(now - prev);
        }
        last_step = Some(now);

        // 観測と推定（モードに関わらず毎ステップ）
        let y = DVector::from_vec(shared.read_markers());
        observer.update(&gains, &y, &u_prev);

        // 保留コマンドの消費（無ければ前回適用値を維持）
        if let Some(update) = shared.take_command_update() {
            command.absorb(update);
        }

        let raw = match command.mode {
            ControlMode::OpenLoop => command.reference(),
            ControlMode::ClosedLoop => {
                closed_loop_command(&gains, command.reference(), observer.x_hat())
            }
        };
        let smoothed = match filter.as_mut() {
            Some(f) => f.apply(raw),
            None => raw,
        };

        let angles = compose_angles(smoothed, &home);
        if let Err(e) = motor.send_angles(&angles) {
            warn!(error = %e, "Actuator send failed, degraded step");
        } else {
            match motor.read_angles() {
                Ok(achieved) => {
                    u_prev = DVector::from_vec(vec![achieved[0] - home[0], achieved[2] - home[2]]);
                }
                Err(e) => {
                    warn!(error = %e, "Angle readback failed, keeping last achieved input");
                }
            }
        }
        debug!(mode = command.mode.label(), command = ?smoothed, "Step complete");

        if stats.should_report() {
            stats.report_and_reset();
        }
    }

    info!("Control thread exiting");
    Ok(())
}
