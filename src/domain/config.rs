//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。
//! プラント行列・ゲインなどの実行時導出は行わず、すべて起動時に与える。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult};

/// アプリケーション設定のルート構造
#[allow(dead_code)]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// カメラ（知覚）設定
    pub camera: CameraConfig,
    /// モーター設定
    pub motors: MotorConfig,
    /// 制御ループ設定
    pub control: ControlConfig,
    /// ログ設定
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// カメラ設定
///
/// ピクセル→物理座標の逆投影に使う内部パラメータと作業深度。
/// 実行時に再導出されることはない。
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CameraConfig {
    /// 焦点距離 fx（ピクセル）
    pub fx: f64,
    /// 焦点距離 fy（ピクセル）
    pub fy: f64,
    /// 主点 cx（ピクセル）
    pub cx: f64,
    /// 主点 cy（ピクセル）
    pub cy: f64,
    /// 平面逆投影に使う固定の作業深度（mm）
    pub working_depth_mm: f64,
    /// トラッキングする物理マーカー数
    ///
    /// 正準順序付けは3マーカー用に定義されているため、現状は3固定
    pub marker_count: usize,
    /// フレームレート（Hz）
    pub frame_rate_hz: f64,
}

impl CameraConfig {
    /// 実機深度カメラの内部パラメータ（キャリブレーション済み）
    pub const DEFAULT_FX: f64 = 382.605;
    pub const DEFAULT_FY: f64 = 382.605;
    pub const DEFAULT_CX: f64 = 319.475;
    pub const DEFAULT_CY: f64 = 240.962;
    /// デフォルトの作業深度（mm）
    pub const DEFAULT_WORKING_DEPTH_MM: f64 = 249.0;
    /// デフォルトのマーカー数
    pub const DEFAULT_MARKER_COUNT: usize = 3;
    /// デフォルトのフレームレート
    pub const DEFAULT_FRAME_RATE_HZ: f64 = 60.0;

    /// フレーム周期
    #[allow(dead_code)]
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fx: Self::DEFAULT_FX,
            fy: Self::DEFAULT_FY,
            cx: Self::DEFAULT_CX,
            cy: Self::DEFAULT_CY,
            working_depth_mm: Self::DEFAULT_WORKING_DEPTH_MM,
            marker_count: Self::DEFAULT_MARKER_COUNT,
            frame_rate_hz: Self::DEFAULT_FRAME_RATE_HZ,
        }
    }
}

/// モーター設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MotorConfig {
    /// セットアップ時に記録された原点角度（ラジアン、4軸）
    ///
    /// 軸0,2が制御対象、軸1,3は固定保持される補助軸
    pub home_angles: [f64; 4],

    /// ドライバオープンの再試行上限
    ///
    /// この回数を超えてもオープンできない場合は致命的エラー
    pub open_retry_limit: u32,

    /// オープン再試行の間隔（ミリ秒）
    pub open_retry_delay_ms: u64,
}

impl MotorConfig {
    /// デフォルトの原点角度
    pub const DEFAULT_HOME_ANGLES: [f64; 4] = [0.7, 0.0, 0.7, 0.0];
    /// デフォルトのオープン再試行上限
    pub const DEFAULT_OPEN_RETRY_LIMIT: u32 = 10;
    /// デフォルトの再試行間隔（ミリ秒）
    pub const DEFAULT_OPEN_RETRY_DELAY_MS: u64 = 1000;

    #[allow(dead_code)]
    pub fn open_retry_delay(&self) -> Duration {
        Duration::from_millis(self.open_retry_delay_ms)
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            home_angles: Self::DEFAULT_HOME_ANGLES,
            open_retry_limit: Self::DEFAULT_OPEN_RETRY_LIMIT,
            open_retry_delay_ms: Self::DEFAULT_OPEN_RETRY_DELAY_MS,
        }
    }
}

/// 制御ループ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlConfig {
    /// ゲイン成果物（JSON）のパス
    ///
    /// オフラインのLMI合成が出力した (A,B,C,K,G,L) を読み込む
    pub gains_path: String,

    /// 指令の一次ローパスフィルタ設定
    #[serde(default)]
    pub command_filter: CommandFilterConfig,

    /// ループ統計の出力間隔（秒）
    pub stats_interval_sec: u64,
}

impl ControlConfig {
    pub const DEFAULT_GAINS_PATH: &'static str = "gains.json";
    pub const DEFAULT_STATS_INTERVAL_SEC: u64 = 10;

    #[allow(dead_code)]
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_sec)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            gains_path: Self::DEFAULT_GAINS_PATH.to_string(),
            command_filter: CommandFilterConfig::default(),
            stats_interval_sec: Self::DEFAULT_STATS_INTERVAL_SEC,
        }
    }
}

/// 指令ローパスフィルタ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommandFilterConfig {
    /// フィルタを有効化するか
    pub enabled: bool,
    /// カットオフ周波数（Hz）
    pub cutoff_hz: f64,
}

impl CommandFilterConfig {
    pub const DEFAULT_CUTOFF_HZ: f64 = 30.0;
}

impl Default for CommandFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cutoff_hz: Self::DEFAULT_CUTOFF_HZ,
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// ログレベル（"info", "debug", "trace"等）
    pub level: String,
    /// JSON形式で出力するか
    pub json: bool,
    /// ログファイル出力先ディレクトリ（None = 標準出力）
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| DomainError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// 設定値の検証
    ///
    /// 起動時に一度だけ呼び、不正な設定では起動を拒否する。
    pub fn validate(&self) -> DomainResult<()> {
        if self.camera.fx <= 0.0 || self.camera.fy <= 0.0 {
            return Err(DomainError::Configuration(
                "Camera focal lengths must be positive".to_string(),
            ));
        }
        if self.camera.working_depth_mm <= 0.0 {
            return Err(DomainError::Configuration(
                "Working depth must be positive".to_string(),
            ));
        }
        // 正準順序付け（最大垂直軸の点 + 深度軸昇順の2点）は3マーカー前提
        if self.camera.marker_count != 3 {
            return Err(DomainError::Configuration(format!(
                "marker_count must be 3 (canonical ordering is defined for 3 markers), got {}",
                self.camera.marker_count
            )));
        }
        if self.camera.frame_rate_hz <= 0.0 {
            return Err(DomainError::Configuration(
                "Frame rate must be positive".to_string(),
            ));
        }
        if self.motors.open_retry_limit == 0 {
            return Err(DomainError::Configuration(
                "open_retry_limit must be at least 1".to_string(),
            ));
        }
        if self.control.command_filter.enabled && self.control.command_filter.cutoff_hz <= 0.0 {
            return Err(DomainError::Configuration(
                "Command filter cutoff must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_marker_count_rejected() {
        let mut config = AppConfig::default();
        config.camera.marker_count = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_focal_length_rejected() {
        let mut config = AppConfig::default();
        config.camera.fx = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_limit_rejected() {
        let mut config = AppConfig::default();
        config.motors.open_retry_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let toml = toml::to_string(&AppConfig::default()).unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let loaded = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.camera.marker_count, 3);
        assert_eq!(loaded.motors.home_angles, MotorConfig::DEFAULT_HOME_ANGLES);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_from_file_missing() {
        let result = AppConfig::from_file("/nonexistent/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_period() {
        let config = CameraConfig::default();
        let period = config.frame_period();
        // 60Hz → 約16.6ms
        assert!(period.as_millis() >= 16 && period.as_millis() <= 17);
    }
}
