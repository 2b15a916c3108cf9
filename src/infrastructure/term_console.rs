//! 端末入力アダプタ
//!
//! 標準入力の行コマンドをOperatorActionへ変換してチャネルに流す。
//! ウィジェット描画は持たず、状態表示はログに委ねる。
//!
//! コマンド一覧:
//! - `arm`            アーム（ワンショット）
//! - `active`         アクティブ/非アクティブ切り替え
//! - `mode ol|cl`     希望モードの選択
//! - `commit`         希望モードのコミット
//! - `m1 <rad>`       開ループ軸0の角度設定
//! - `m2 <rad>`       開ループ軸1の角度設定
//! - `r1 <mm>`        閉ループ軸0の参照設定
//! - `r2 <mm>`        閉ループ軸1の参照設定

use std::io::BufRead;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::domain::{ControlMode, OperatorAction};

/// 1行のコマンドをOperatorActionへ解釈する
///
/// 解釈できない行はNone（呼び出し側が警告して無視する）。
pub fn parse_action(line: &str) -> Option<OperatorAction> {
    let mut tokens = line.split_whitespace();
    let command = tokens.next()?;

    match command {
        "arm" => Some(OperatorAction::Arm),
        "active" => Some(OperatorAction::ToggleActive),
        "commit" => Some(OperatorAction::CommitMode),
        "mode" => match tokens.next()? {
            "ol" => Some(OperatorAction::SelectMode(ControlMode::OpenLoop)),
            "cl" => Some(OperatorAction::SelectMode(ControlMode::ClosedLoop)),
            _ => None,
        },
        "m1" | "m2" => {
            let axis = if command == "m1" { 0 } else { 1 };
            let angle_rad: f64 = tokens.next()?.parse().ok()?;
            Some(OperatorAction::AdjustMotor { axis, angle_rad })
        }
        "r1" | "r2" => {
            let axis = if command == "r1" { 0 } else { 1 };
            let millimeters: f64 = tokens.next()?.parse().ok()?;
            Some(OperatorAction::AdjustReference { axis, millimeters })
        }
        _ => None,
    }
}

/// 標準入力リーダーを起動する
///
/// EOFでチャネルを閉じて終了する（コンソールアクターは切断を
/// 入力終端として扱う）。
pub fn spawn_stdin_console(sender: Sender<OperatorAction>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        info!("Operator input ready (stdin)");
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Stdin read failed");
                    break;
                }
            };
            match parse_action(&line) {
                Some(action) => {
                    if sender.send(action).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!(line = %line, "Unrecognized command"),
            }
        }
        info!("Operator input closed (EOF)");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_action("arm"), Some(OperatorAction::Arm));
        assert_eq!(parse_action("active"), Some(OperatorAction::ToggleActive));
        assert_eq!(parse_action("commit"), Some(OperatorAction::CommitMode));
    }

    #[test]
    fn test_parse_mode_selection() {
        assert_eq!(
            parse_action("mode ol"),
            Some(OperatorAction::SelectMode(ControlMode::OpenLoop))
        );
        assert_eq!(
            parse_action("mode cl"),
            Some(OperatorAction::SelectMode(ControlMode::ClosedLoop))
        );
        assert_eq!(parse_action("mode xx"), None);
        assert_eq!(parse_action("mode"), None);
    }

    #[test]
    fn test_parse_axis_adjustments() {
        assert_eq!(
            parse_action("m1 0.25"),
            Some(OperatorAction::AdjustMotor { axis: 0, angle_rad: 0.25 })
        );
        assert_eq!(
            parse_action("m2 -0.1"),
            Some(OperatorAction::AdjustMotor { axis: 1, angle_rad: -0.1 })
        );
        assert_eq!(
            parse_action("r1 12.5"),
            Some(OperatorAction::AdjustReference { axis: 0, millimeters: 12.5 })
        );
        assert_eq!(
            parse_action("r2 -3"),
            Some(OperatorAction::AdjustReference { axis: 1, millimeters: -3.0 })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_action(""), None);
        assert_eq!(parse_action("fire"), None);
        assert_eq!(parse_action("m1 abc"), None);
        assert_eq!(parse_action("m1"), None);
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        assert_eq!(
            parse_action("  m1   0.5  "),
            Some(OperatorAction::AdjustMotor { axis: 0, angle_rad: 0.5 })
        );
    }
}
