/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - 致命的エラー（カメラ取得失敗・ゲイン不整合）とステップ内で回復する
///   エラー（モーター往復の一時失敗）を呼び出し側で区別できるようにする

use thiserror::Error;

/// Domain層の統一エラー型
#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum DomainError {
    /// カメラ（フレーム取得・マーカー検出）関連のエラー
    ///
    /// フレーム取得失敗は致命的で、知覚アクターを終了させる。
    #[error("Camera error: {0}")]
    Camera(String),

    /// モータードライバ関連のエラー
    ///
    /// 単発の往復失敗はそのステップ内で劣化運転として回復する。
    #[error("Motor error: {0}")]
    Motor(String),

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// ゲイン成果物（プラント行列・K/G/L）関連のエラー
    ///
    /// 次元不整合・不安定ゲインは起動拒否（致命的）。
    #[error("Gains error: {0}")]
    Gains(String),

    /// アクター監督（スレッド生成・join）関連のエラー
    #[error("Supervisor error: {0}")]
    Supervisor(String),

    /// その他のエラー
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Domain層の統一Result型
pub type DomainResult<T> = Result<T, DomainError>;
