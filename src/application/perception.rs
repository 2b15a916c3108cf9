//! 知覚アクター
//!
//! カメラフレームにペースを委ね、ピクセル重心を物理座標へ逆投影して
//! 共有領域へ公開する。ブロックするのはフレーム待ちの内部のみ。
//! サイクルごとに`frame_acquired`（生存ハートビート）を発火し、
//! `measurement_ready`はアーム中の測定値公開後にのみ発火する。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::application::shared_state::SharedStateRegion;
use crate::domain::{CameraConfig, CameraPort, DomainResult, MarkerSet, PixelMarker};

/// ピクセル重心を制御系の物理座標へ逆投影する
///
/// 固定作業深度dの平面を仮定したピンホール逆投影:
///   x = (px - cx) / fx * d
///   y = (py - cy) / fy * d
/// その後、カメラ座標 (x, y, d) を制御座標 (d, -y, x) へ付け替える
/// （成分0=深度軸、成分1=垂直軸・上向き正、成分2=横軸）。
pub fn pixels_to_control_frame(pixel: PixelMarker, config: &CameraConfig) -> Vector3<f64> {
    let depth = config.working_depth_mm;
    let x = (pixel.px - config.cx) / config.fx * depth;
    let y = (pixel.py - config.cy) / config.fy * depth;
    Vector3::new(depth, -y, x)
}

/// 検出順に依存しない正準マーカー順序を与える
///
/// 3点のうち垂直軸成分（成分1）が最大の点を3番目に置き、
/// 残りの2点を深度軸成分（成分0）の昇順で1・2番目に並べる。
/// 検出器がどの順で重心を返しても同じMarkerSetになる。
pub fn canonical_marker_order(points: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    debug_assert_eq!(points.len(), 3);

    // 比較はtotal orderで行う（NaN混入でも順序は決定的でパニックしない）
    let mut top = 0;
    for i in 1..points.len() {
        if points[i][1].total_cmp(&points[top][1]).is_gt() {
            top = i;
        }
    }

    let mut rest: Vec<Vector3<f64>> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != top)
        .map(|(_, p)| *p)
        .collect();
    rest.sort_by(|a, b| a[0].total_cmp(&b[0]));

    rest.push(points[top]);
    rest
}

/// アーム時点の測定値を原点として差し引くゼロラッチ
///
/// 最初のアーム済みサイクルで生の測定値を保持し、以後は
/// 測定値からラッチ値を引いた偏差を返す。再アームは想定しない。
pub struct ZeroLatch {
    origin: Option<Vec<f64>>,
}

impl ZeroLatch {
    pub fn new() -> Self {
        Self { origin: None }
    }

    /// 生の測定値をラッチ原点からの偏差へ変換する
    pub fn apply(&mut self, measured: &[f64]) -> Vec<f64> {
        let origin = self.origin.get_or_insert_with(|| {
            info!(origin = ?measured, "Zero latch captured at arming");
            measured.to_vec()
        });
        measured
            .iter()
            .zip(origin.iter())
            .map(|(m, o)| m - o)
            .collect()
    }

    #[allow(dead_code)]
    pub fn is_latched(&self) -> bool {
        self.origin.is_some()
    }
}

impl Default for ZeroLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// 知覚スレッドの本体
///
/// shutdownが立つまでフレーム取得サイクルを回す。
/// `wait_frame`の失敗は致命的でErrを返して終了する（Supervisorが
/// スレッド終了を検知して全体を畳む）。検出不足は致命的ではなく、
/// 直前の物理空間結果を保持して公開を続ける。
pub fn perception_thread<C: CameraPort>(
    mut camera: C,
    shared: Arc<SharedStateRegion>,
    shutdown: Arc<AtomicBool>,
    config: CameraConfig,
) -> DomainResult<()> {
    info!("Perception thread started");

    let mut latch = ZeroLatch::new();
    let mut last_measured: Option<Vec<f64>> = None;

    while !shutdown.load(Ordering::Relaxed) {
        camera.wait_frame()?;

        // フレームごとの生存ハートビート（データ準備の合図ではない）
        shared.frame_acquired.set();

        let measured = match camera.marker_pixels() {
            Ok(pixels) if pixels.len() >= config.marker_count => {
                let points: Vec<Vector3<f64>> = pixels
                    .iter()
                    .take(config.marker_count)
                    .map(|p| pixels_to_control_frame(*p, &config))
                    .collect();
                let ordered = MarkerSet::new(canonical_marker_order(&points));
                let values = ordered.measured_components();
                last_measured = Some(values.clone());
                Some(values)
            }
            Ok(pixels) => {
                debug!(
                    detected = pixels.len(),
                    expected = config.marker_count,
                    "Under-detection, holding last measurement"
                );
                last_measured.clone()
            }
            Err(e) => {
                warn!(error = %e, "Marker extraction failed, holding last measurement");
                last_measured.clone()
            }
        };

        let Some(measured) = measured else {
            // まだ一度も完全検出がない: 公開もシグナルも行わない
            continue;
        };

        // アーム前は共有領域に書かない（測定はローカル保持のみ）
        if shared.is_armed() {
            let deviation = latch.apply(&measured);
            shared.publish_markers(&deviation);
            shared.measurement_ready.set();
        }
    }

    info!("Perception thread exiting");
    Ok(())
}
