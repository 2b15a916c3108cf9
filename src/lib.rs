//! カメラ観測フィードバックによる2軸機構のリアルタイム制御
//!
//! 3アクター構成: 知覚（カメラ→物理座標）、オペレーターコンソール、
//! 制御ループ（Luenbergerオブザーバ + 状態フィードバック）。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod logging;
