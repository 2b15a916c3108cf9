//! オペレーターコンソールアクター
//!
//! オペレーターの操作を受信し、共有領域のコマンドフィールドへ変換する。
//! 状態機械は `NotArmed → Armed(Active) ⇄ Armed(Inactive)` で、
//! 遷移関数はOperatorAction全域で定義される（無効な操作は黙って無視）。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use crate::application::shared_state::SharedStateRegion;
use crate::domain::{ControlMode, DomainResult, OperatorAction};

/// 操作受信のポーリング間隔（shutdown確認を兼ねる）
const ACTION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// コンソール状態機械
///
/// 手動セットポイントはコンソールのローカル状態であり、公開された
/// 参照値とは独立に保持される。公開は遷移規則が許すときのみ行う。
pub struct OperatorConsole {
    shared: Arc<SharedStateRegion>,
    armed: bool,
    active: bool,
    desired_mode: ControlMode,
    /// 開ループ系の手動セットポイント（モーター角度、ラジアン）
    motor_setpoints: [f64; 2],
    /// 閉ループ系の手動セットポイント（デカルト参照、mm）
    reference_setpoints: [f64; 2],
}

impl OperatorConsole {
    pub fn new(shared: Arc<SharedStateRegion>) -> Self {
        Self {
            shared,
            armed: false,
            active: false,
            desired_mode: ControlMode::default(),
            motor_setpoints: [0.0; 2],
            reference_setpoints: [0.0; 2],
        }
    }

    /// 操作を1つ処理する（全域遷移関数）
    pub fn handle(&mut self, action: OperatorAction) {
        match action {
            OperatorAction::Arm => self.handle_arm(),
            OperatorAction::ToggleActive => self.handle_toggle_active(),
            OperatorAction::SelectMode(mode) => self.handle_select_mode(mode),
            OperatorAction::CommitMode => self.handle_commit_mode(),
            OperatorAction::AdjustMotor { axis, angle_rad } => {
                self.handle_adjust(ControlMode::OpenLoop, axis, angle_rad)
            }
            OperatorAction::AdjustReference { axis, millimeters } => {
                self.handle_adjust(ControlMode::ClosedLoop, axis, millimeters)
            }
        }
    }

    /// アーム（ワンショット）: Armed(Active)へ遷移し、現在の手動
    /// セットポイントを開ループ参照として公開する
    fn handle_arm(&mut self) {
        if self.armed {
            debug!("Arm ignored: already armed");
            return;
        }
        self.armed = true;
        self.active = true;
        self.shared.write_open_loop_ref(self.motor_setpoints);
        self.shared.set_armed(true);
        self.shared.set_update_pending();
        info!(
            setpoints = ?self.motor_setpoints,
            "Armed (active, open loop)"
        );
    }

    /// アクティブ切り替え: 再アクティブ化では共有領域の裁定済み
    /// モードを読み戻し、そのモード系の参照を再公開する
    fn handle_toggle_active(&mut self) {
        if !self.armed {
            debug!("ToggleActive ignored: not armed");
            return;
        }
        self.active = !self.active;

        if self.active {
            let mode = self.shared.committed_mode();
            match mode {
                ControlMode::OpenLoop => self.shared.write_open_loop_ref(self.motor_setpoints),
                ControlMode::ClosedLoop => {
                    self.shared.write_closed_loop_ref(self.reference_setpoints)
                }
            }
            self.shared.set_update_pending();
            info!(mode = mode.label(), "Console active");
        } else {
            info!("Console inactive");
        }
    }

    /// 希望モードのラベル変更のみ。公開はCommitModeで行う
    fn handle_select_mode(&mut self, mode: ControlMode) {
        if !self.armed {
            debug!("SelectMode ignored: not armed");
            return;
        }
        self.desired_mode = mode;
        debug!(mode = mode.label(), "Desired mode selected");
    }

    /// 希望モードを共有領域へコミットする
    fn handle_commit_mode(&mut self) {
        if !self.armed {
            debug!("CommitMode ignored: not armed");
            return;
        }
        self.shared.commit_mode(self.desired_mode);
        self.shared.set_update_pending();
        info!(mode = self.desired_mode.label(), "Mode committed");
    }

    /// 手動軸調整
    ///
    /// NotArmedでは拒否し、該当セットポイントを中立へ戻す。
    /// アーム中は自モード系の参照のみ再公開し、updatePendingは
    /// Activeの間だけ立てる。
    fn handle_adjust(&mut self, family: ControlMode, axis: usize, value: f64) {
        if axis >= 2 {
            debug!(axis, "Adjust ignored: axis out of range");
            return;
        }

        let setpoints = match family {
            ControlMode::OpenLoop => &mut self.motor_setpoints,
            ControlMode::ClosedLoop => &mut self.reference_setpoints,
        };

        if !self.armed {
            setpoints[axis] = 0.0;
            debug!(axis, "Adjust rejected while not armed, setpoint reset");
            return;
        }

        setpoints[axis] = value;
        match family {
            ControlMode::OpenLoop => self.shared.write_open_loop_ref(self.motor_setpoints),
            ControlMode::ClosedLoop => self.shared.write_closed_loop_ref(self.reference_setpoints),
        }
        if self.active {
            self.shared.set_update_pending();
        }
        debug!(family = family.label(), axis, value, "Setpoint adjusted");
    }

    #[allow(dead_code)]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// コンソールスレッドの本体
///
/// チャネルから操作を受信して状態機械に流す。チャネル切断は
/// オペレーター入力の終端とみなし正常終了する。
pub fn console_thread(
    actions: Receiver<OperatorAction>,
    shared: Arc<SharedStateRegion>,
    shutdown: Arc<AtomicBool>,
) -> DomainResult<()> {
    info!("Console thread started");
    let mut console = OperatorConsole::new(shared);

    while !shutdown.load(Ordering::Relaxed) {
        match actions.recv_timeout(ACTION_POLL_INTERVAL) {
            Ok(action) => console.handle(action),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Operator input closed");
                break;
            }
        }
    }

    info!("Console thread exiting");
    Ok(())
}
