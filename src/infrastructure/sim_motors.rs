//! シミュレーションモーターアダプタ
//!
//! 実機4軸ドライバの代替。送信された角度を即座に到達角度として
//! 保持する理想応答モデル。内部状態はArcで共有でき、テストから
//! 送信履歴を検査できる。

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::{DomainError, DomainResult, MotorPort};

struct SimMotorState {
    opened: bool,
    remaining_open_failures: u32,
    angles: [f64; 4],
    send_count: u64,
}

/// シミュレーションモーター
///
/// Cloneで同じ内部状態へのハンドルが得られる。
#[derive(Clone)]
pub struct SimMotorAdapter {
    inner: Arc<Mutex<SimMotorState>>,
}

impl SimMotorAdapter {
    pub fn new() -> Self {
        Self::with_open_failures(0)
    }

    /// 最初のn回のopenを失敗させる（再試行パスの検証用）
    pub fn with_open_failures(n: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimMotorState {
                opened: false,
                remaining_open_failures: n,
                angles: [0.0; 4],
                send_count: 0,
            })),
        }
    }

    /// 最後に送信された角度指令
    pub fn last_command(&self) -> [f64; 4] {
        self.inner.lock().unwrap().angles
    }

    /// 送信回数
    pub fn send_count(&self) -> u64 {
        self.inner.lock().unwrap().send_count
    }
}

impl Default for SimMotorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorPort for SimMotorAdapter {
    fn open(&mut self) -> DomainResult<()> {
        let mut state = self.inner.lock().unwrap();
        if state.remaining_open_failures > 0 {
            state.remaining_open_failures -= 1;
            return Err(DomainError::Motor(
                "Simulated driver open failure".to_string(),
            ));
        }
        state.opened = true;
        Ok(())
    }

    fn send_angles(&mut self, angles: &[f64; 4]) -> DomainResult<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.opened {
            return Err(DomainError::Motor("Driver not opened".to_string()));
        }
        state.angles = *angles;
        state.send_count += 1;
        debug!(angles = ?angles, "Simulated motor command");
        Ok(())
    }

    fn read_angles(&mut self) -> DomainResult<[f64; 4]> {
        let state = self.inner.lock().unwrap();
        if !state.opened {
            return Err(DomainError::Motor("Driver not opened".to_string()));
        }
        // 理想応答: 指令角度に即時到達
        Ok(state.angles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_before_open_rejected() {
        let mut motor = SimMotorAdapter::new();
        assert!(motor.send_angles(&[0.0; 4]).is_err());
        motor.open().unwrap();
        assert!(motor.send_angles(&[0.0; 4]).is_ok());
    }

    #[test]
    fn test_readback_returns_last_command() {
        let mut motor = SimMotorAdapter::new();
        motor.open().unwrap();
        motor.send_angles(&[0.7, 0.0, 0.5, 0.0]).unwrap();
        assert_eq!(motor.read_angles().unwrap(), [0.7, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_open_failures_then_recover() {
        let mut motor = SimMotorAdapter::with_open_failures(2);
        assert!(motor.open().is_err());
        assert!(motor.open().is_err());
        assert!(motor.open().is_ok());
    }

    #[test]
    fn test_cloned_handle_shares_state() {
        let mut motor = SimMotorAdapter::new();
        let handle = motor.clone();
        motor.open().unwrap();
        motor.send_angles(&[0.1, 0.0, 0.2, 0.0]).unwrap();

        assert_eq!(handle.last_command(), [0.1, 0.0, 0.2, 0.0]);
        assert_eq!(handle.send_count(), 1);
    }
}
