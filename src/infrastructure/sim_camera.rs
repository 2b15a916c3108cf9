//! シミュレーションカメラアダプタ
//!
//! 実機深度カメラの代替。フレーム周期でブロックし、主点まわりを
//! 正弦運動する3マーカーのピクセル重心を生成する。検出不足や
//! 取得失敗の再現用ノブをビルダーで提供する（テストとドライラン用）。

use std::time::Duration;

use tracing::debug;

use crate::domain::{CameraConfig, DomainError, DomainResult, PixelMarker};

/// シミュレーションカメラ
pub struct SimCameraAdapter {
    cx: f64,
    cy: f64,
    marker_count: usize,
    frame_period: Duration,
    frame: u64,
    /// このフレーム番号の倍数で検出不足を再現する
    dropout_every: Option<u64>,
    /// このフレーム数の後に取得失敗（致命的）を再現する
    fail_after: Option<u64>,
}

impl SimCameraAdapter {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            cx: config.cx,
            cy: config.cy,
            marker_count: config.marker_count,
            frame_period: config.frame_period(),
            frame: 0,
            dropout_every: None,
            fail_after: None,
        }
    }

    /// nフレームごとに検出不足（1点のみ）を起こす
    pub fn with_dropout_every(mut self, n: u64) -> Self {
        self.dropout_every = Some(n);
        self
    }

    /// nフレーム処理後にwait_frameを失敗させる
    pub fn with_fail_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl crate::domain::CameraPort for SimCameraAdapter {
    fn wait_frame(&mut self) -> DomainResult<()> {
        if let Some(limit) = self.fail_after {
            if self.frame >= limit {
                return Err(DomainError::Camera(format!(
                    "Simulated acquisition failure after {} frames",
                    limit
                )));
            }
        }
        std::thread::sleep(self.frame_period);
        self.frame += 1;
        Ok(())
    }

    fn marker_pixels(&mut self) -> DomainResult<Vec<PixelMarker>> {
        if let Some(n) = self.dropout_every {
            if self.frame % n == 0 {
                debug!(frame = self.frame, "Simulated marker dropout");
                return Ok(vec![PixelMarker::new(self.cx, self.cy)]);
            }
        }

        // 主点まわりの緩やかな正弦運動
        let t = self.frame as f64 * self.frame_period.as_secs_f64();
        let wobble = 5.0 * (2.0 * std::f64::consts::PI * 0.2 * t).sin();

        let mut pixels = Vec::with_capacity(self.marker_count);
        // 下段2点（左・右）と上段1点のレイアウト
        pixels.push(PixelMarker::new(self.cx - 30.0 + wobble, self.cy + 25.0));
        pixels.push(PixelMarker::new(self.cx + 30.0 + wobble, self.cy + 27.0));
        pixels.push(PixelMarker::new(self.cx + wobble, self.cy - 40.0));
        pixels.truncate(self.marker_count);
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CameraPort;

    fn fast_config() -> CameraConfig {
        CameraConfig {
            frame_rate_hz: 10_000.0,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn test_generates_marker_count_pixels() {
        let config = fast_config();
        let mut camera = SimCameraAdapter::new(&config);
        camera.wait_frame().unwrap();
        assert_eq!(camera.marker_pixels().unwrap().len(), 3);
    }

    #[test]
    fn test_fail_after_is_fatal() {
        let config = fast_config();
        let mut camera = SimCameraAdapter::new(&config).with_fail_after(2);
        assert!(camera.wait_frame().is_ok());
        assert!(camera.wait_frame().is_ok());
        assert!(camera.wait_frame().is_err());
    }

    #[test]
    fn test_dropout_returns_fewer_markers() {
        let config = fast_config();
        let mut camera = SimCameraAdapter::new(&config).with_dropout_every(2);
        camera.wait_frame().unwrap(); // frame=1
        assert_eq!(camera.marker_pixels().unwrap().len(), 3);
        camera.wait_frame().unwrap(); // frame=2
        assert_eq!(camera.marker_pixels().unwrap().len(), 1);
    }
}
