//! ログ初期化
//!
//! tracing-subscriberによる構造化ログのセットアップ。
//! RUST_LOG環境変数が設定されていればそれを優先し、無ければ
//! 設定ファイルのレベルを使う。ファイル出力時は日次ローテーション。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::domain::LoggingConfig;

/// ログを初期化する
///
/// # Returns
/// ファイル出力時のWorkerGuard。プロセス終了までmainで保持すること
/// （dropするとバッファが失われる）。
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "control.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            Some(guard)
        }
        None => {
            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
            None
        }
    }
}
