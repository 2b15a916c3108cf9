//! Domain層: ビジネスロジックの中心
//!
//! 外部依存を持たない型・trait・ゲイン成果物の定義。
//! Infrastructureがportsを実装し、Applicationのアクターが消費する。

pub mod config;
pub mod error;
pub mod gains;
pub mod ports;
pub mod types;

pub use config::*;
pub use error::*;
pub use gains::*;
pub use ports::*;
pub use types::*;
