//! Application層: アクターの実装と監視
//!
//! 共有状態領域を介して協調する3アクター（知覚・コンソール・制御）と、
//! それらを起動・監視するSupervisorを提供する。

pub mod console;
pub mod control;
pub mod perception;
pub mod shared_state;
pub mod stats;
pub mod supervisor;

pub use console::{console_thread, OperatorConsole};
pub use control::{control_thread, closed_loop_command, CommandFilter, StateObserver};
pub use perception::{canonical_marker_order, perception_thread, pixels_to_control_frame};
pub use shared_state::{CommandUpdate, SharedStateRegion, SignalEvent};
pub use stats::LoopStats;
pub use supervisor::run_supervised;
