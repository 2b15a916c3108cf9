//! 制御ループ統計
//!
//! ステップ周期dtのサンプルを蓄積し、一定間隔でパーセンタイルを
//! tracing経由で報告する。測定はベストエフォートで制御自体には影響しない。

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

/// サンプル保持上限（60Hz × 報告間隔数十秒に十分）
const MAX_SAMPLES: usize = 4096;

/// ループ周期の統計コレクタ
pub struct LoopStats {
    samples: VecDeque<f64>,
    interval: Duration,
    last_report: Instant,
    total_steps: u64,
}

impl LoopStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            interval,
            last_report: Instant::now(),
            total_steps: 0,
        }
    }

    /// 1ステップ分の周期を記録する
    pub fn record(&mut self, dt: Duration) {
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(dt.as_secs_f64() * 1000.0);
        self.total_steps += 1;
    }

    /// 報告間隔が経過していればtrue
    pub fn should_report(&self) -> bool {
        self.last_report.elapsed() >= self.interval
    }

    /// パーセンタイルを報告してウィンドウをリセットする
    pub fn report_and_reset(&mut self) {
        if self.samples.is_empty() {
            self.last_report = Instant::now();
            return;
        }

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        info!(
            steps = self.total_steps,
            window = sorted.len(),
            p50_ms = percentile(&sorted, 0.50),
            p95_ms = percentile(&sorted, 0.95),
            p99_ms = percentile(&sorted, 0.99),
            "Control loop timing"
        );

        self.samples.clear();
        self.last_report = Instant::now();
    }
}

/// ソート済みスライスからパーセンタイル値を取る（最近傍法）
fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
