//! Infrastructure層: 外部デバイスと入出力のアダプタ
//!
//! Domain層のポート（CameraPort / MotorPort）の実装と、
//! オペレーター入力のアダプタを提供する。

pub mod sim_camera;
pub mod sim_motors;
pub mod term_console;

pub use sim_camera::SimCameraAdapter;
pub use sim_motors::SimMotorAdapter;
pub use term_console::{parse_action, spawn_stdin_console};
