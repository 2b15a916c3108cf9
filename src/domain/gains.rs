//! ゲイン成果物の読み込みと検証
//!
//! オフラインの凸最適化（減衰率制約付きLMI合成）が出力した
//! 離散化プラント (A,B,C) とゲイン (K,G,L) をJSONから読み込む。
//! 合成そのもの（SDP）は実行時経路の外にあり、このモジュールは
//! 成果物の整合性検証と、成果物がLを省略した場合の双対LQR
//! Riccati漸化式による観測器ゲインの再導出のみを行う。
//!
//! 不整合・不安定なゲインでの起動は拒否する（致命的設定エラー）。

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{DomainError, DomainResult};

/// 閉ループの1ステップ当たり収縮率上限（LMI合成の減衰率制約）
pub const CLOSED_LOOP_DECAY: f64 = 0.99;

/// 観測器合成の状態推定誤差コスト Q = 8e2·I
const OBSERVER_STATE_COST: f64 = 8e2;
/// 観測器合成のノイズコスト R = 1e1·I
const OBSERVER_NOISE_COST: f64 = 1e1;

/// Riccati漸化式の収束判定閾値と反復上限
const RICCATI_TOLERANCE: f64 = 1e-9;
const RICCATI_MAX_ITERATIONS: usize = 10_000;

/// ゲイン成果物のファイル形式（JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GainsFile {
    /// 離散化状態行列 A (nx×nx)
    state_matrix: Vec<Vec<f64>>,
    /// 入力行列 B (nx×nu)
    input_matrix: Vec<Vec<f64>>,
    /// 出力行列 C (ny×nx)
    output_matrix: Vec<Vec<f64>>,
    /// 状態フィードバックゲイン K (nu×nx)
    feedback_gain: Vec<Vec<f64>>,
    /// フィードフォワードゲイン G (nu×nu)
    feedforward_gain: Vec<Vec<f64>>,
    /// 観測器ゲイン L (nx×ny)。省略時は双対LQRで再導出する
    #[serde(default)]
    observer_gain: Option<Vec<Vec<f64>>>,
}

/// 検証済みのプラント行列とゲイン一式
///
/// ControlProcessが起動時に一度だけ受け取り、実行中は不変。
#[derive(Debug, Clone)]
pub struct ControlGains {
    /// 状態行列 A
    pub a: DMatrix<f64>,
    /// 入力行列 B
    pub b: DMatrix<f64>,
    /// 出力行列 C
    pub c: DMatrix<f64>,
    /// 状態フィードバックゲイン K
    pub k: DMatrix<f64>,
    /// フィードフォワードゲイン G
    pub g: DMatrix<f64>,
    /// 観測器ゲイン L
    pub l: DMatrix<f64>,
}

impl ControlGains {
    /// 状態次元 nx
    pub fn nx(&self) -> usize {
        self.a.nrows()
    }

    /// 入力次元 nu
    pub fn nu(&self) -> usize {
        self.b.ncols()
    }

    /// 観測次元 ny
    pub fn ny(&self) -> usize {
        self.c.nrows()
    }

    /// JSON成果物からゲイン一式を読み込んで検証する
    pub fn load<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Gains(format!(
                "Failed to read gains file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let file: GainsFile = serde_json::from_str(&content)
            .map_err(|e| DomainError::Gains(format!("Failed to parse gains file: {}", e)))?;

        let a = matrix_from_rows("state_matrix", &file.state_matrix)?;
        let b = matrix_from_rows("input_matrix", &file.input_matrix)?;
        let c = matrix_from_rows("output_matrix", &file.output_matrix)?;
        let k = matrix_from_rows("feedback_gain", &file.feedback_gain)?;
        let g = matrix_from_rows("feedforward_gain", &file.feedforward_gain)?;

        let l = match &file.observer_gain {
            Some(rows) => matrix_from_rows("observer_gain", rows)?,
            None => {
                tracing::info!("Gains file omits observer gain, running dual-LQR recursion");
                synth_observer_gain(&a, &c)?
            }
        };

        let gains = Self { a, b, c, k, g, l };
        gains.validate()?;
        Ok(gains)
    }

    /// 次元整合と安定性の検証
    ///
    /// - A は正方、B/C/K/G/L の次元は (nx,nu,ny) に整合すること
    /// - A − L·C はSchur安定であること
    /// - A − B·K の収縮率は減衰率制約 0.99 以下であること
    pub fn validate(&self) -> DomainResult<()> {
        let (nx, nu, ny) = (self.nx(), self.nu(), self.ny());

        if self.a.nrows() != self.a.ncols() {
            return Err(DomainError::Gains(format!(
                "State matrix must be square, got {}x{}",
                self.a.nrows(),
                self.a.ncols()
            )));
        }
        check_shape("input_matrix", &self.b, nx, nu)?;
        check_shape("output_matrix", &self.c, ny, nx)?;
        check_shape("feedback_gain", &self.k, nu, nx)?;
        check_shape("feedforward_gain", &self.g, nu, nu)?;
        check_shape("observer_gain", &self.l, nx, ny)?;

        let observer_radius = spectral_radius(&(&self.a - &self.l * &self.c));
        if observer_radius >= 1.0 {
            return Err(DomainError::Gains(format!(
                "Observer dynamics A-LC are not Schur stable (spectral radius {:.6})",
                observer_radius
            )));
        }

        let controller_radius = spectral_radius(&(&self.a - &self.b * &self.k));
        if controller_radius > CLOSED_LOOP_DECAY + RICCATI_TOLERANCE {
            return Err(DomainError::Gains(format!(
                "Closed loop A-BK violates decay bound {} (spectral radius {:.6})",
                CLOSED_LOOP_DECAY, controller_radius
            )));
        }

        Ok(())
    }
}

/// 行ベクトルの集まりから行列を組み立てる（ラグ付き行列は拒否）
fn matrix_from_rows(name: &str, rows: &[Vec<f64>]) -> DomainResult<DMatrix<f64>> {
    if rows.is_empty() || rows[0].is_empty() {
        return Err(DomainError::Gains(format!("Matrix {} is empty", name)));
    }
    let ncols = rows[0].len();
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(DomainError::Gains(format!(
            "Matrix {} has rows of unequal length",
            name
        )));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(rows.len(), ncols, &flat))
}

fn check_shape(
    name: &str,
    m: &DMatrix<f64>,
    nrows: usize,
    ncols: usize,
) -> DomainResult<()> {
    if m.nrows() != nrows || m.ncols() != ncols {
        return Err(DomainError::Gains(format!(
            "Matrix {} must be {}x{}, got {}x{}",
            name,
            nrows,
            ncols,
            m.nrows(),
            m.ncols()
        )));
    }
    Ok(())
}

/// スペクトル半径（固有値の最大絶対値）
pub fn spectral_radius(m: &DMatrix<f64>) -> f64 {
    m.complex_eigenvalues()
        .iter()
        .map(|e| e.norm())
        .fold(0.0, f64::max)
}

/// 双対LQRのRiccati漸化式による観測器ゲインの導出
///
/// (Aᵀ, Cᵀ) 上の離散LQRに等価: P を固定点まで反復し
/// `L = A·P·Cᵀ·(C·P·Cᵀ + R)⁻¹` を返す。Q = 8e2·I, R = 1e1·I。
pub fn synth_observer_gain(a: &DMatrix<f64>, c: &DMatrix<f64>) -> DomainResult<DMatrix<f64>> {
    let nx = a.nrows();
    let ny = c.nrows();
    if c.ncols() != nx {
        return Err(DomainError::Gains(format!(
            "Output matrix must be ny x nx, got {}x{}",
            c.nrows(),
            c.ncols()
        )));
    }

    let q = DMatrix::<f64>::identity(nx, nx) * OBSERVER_STATE_COST;
    let r = DMatrix::<f64>::identity(ny, ny) * OBSERVER_NOISE_COST;

    let mut p = q.clone();
    for _ in 0..RICCATI_MAX_ITERATIONS {
        let innovation = &r + c * &p * c.transpose();
        let innovation_inv = innovation.clone().try_inverse().ok_or_else(|| {
            DomainError::Gains("Riccati innovation matrix is singular".to_string())
        })?;

        let next = a * &p * a.transpose()
            - a * &p * c.transpose() * &innovation_inv * (c * &p * a.transpose())
            + &q;

        let delta = (&next - &p).abs().max();
        p = next;

        if delta < RICCATI_TOLERANCE {
            let innovation = &r + c * &p * c.transpose();
            let innovation_inv = innovation.try_inverse().ok_or_else(|| {
                DomainError::Gains("Riccati innovation matrix is singular".to_string())
            })?;
            return Ok(a * &p * c.transpose() * innovation_inv);
        }
    }

    Err(DomainError::Gains(
        "Riccati recursion did not converge".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// 手組みの安定なテスト用ゲイン (nx=2, nu=1, ny=1)
    fn small_gains() -> ControlGains {
        ControlGains {
            a: DMatrix::from_row_slice(2, 2, &[0.9, 0.0, 0.0, 0.8]),
            b: DMatrix::from_row_slice(2, 1, &[1.0, 0.0]),
            c: DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            k: DMatrix::from_row_slice(1, 2, &[0.4, 0.0]),
            g: DMatrix::from_row_slice(1, 1, &[1.0]),
            l: DMatrix::from_row_slice(2, 1, &[0.5, 0.0]),
        }
    }

    #[test]
    fn test_valid_gains_accepted() {
        // A-LC = diag(0.4, 0.8)、A-BK = diag(0.5, 0.8)
        assert!(small_gains().validate().is_ok());
    }

    #[test]
    fn test_unstable_observer_rejected() {
        let mut gains = small_gains();
        // A-LC = diag(1.2, 0.8) → 不安定
        gains.l = DMatrix::from_row_slice(2, 1, &[-0.3, 0.0]);
        assert!(gains.validate().is_err());
    }

    #[test]
    fn test_decay_bound_violation_rejected() {
        let mut gains = small_gains();
        // A-BK = diag(0.995, 0.8) → 収縮率0.99超
        gains.k = DMatrix::from_row_slice(1, 2, &[-0.095, 0.0]);
        assert!(gains.validate().is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut gains = small_gains();
        gains.k = DMatrix::from_row_slice(1, 3, &[0.1, 0.0, 0.0]);
        assert!(gains.validate().is_err());
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matrix_from_rows("test", &rows).is_err());
    }

    #[test]
    fn test_spectral_radius_diagonal() {
        let m = DMatrix::from_row_slice(2, 2, &[0.9, 0.0, 0.0, -0.3]);
        let radius = spectral_radius(&m);
        assert!((radius - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_synth_observer_gain_stabilizes() {
        let a = DMatrix::from_row_slice(2, 2, &[0.95, 0.1, 0.0, 0.9]);
        let c = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);

        let l = synth_observer_gain(&a, &c).unwrap();
        assert_eq!(l.nrows(), 2);
        assert_eq!(l.ncols(), 1);

        let radius = spectral_radius(&(&a - &l * &c));
        assert!(radius < 1.0, "A-LC spectral radius {} not stable", radius);
    }

    #[test]
    fn test_load_from_json() {
        let json = serde_json::json!({
            "state_matrix": [[0.9, 0.0], [0.0, 0.8]],
            "input_matrix": [[1.0], [0.0]],
            "output_matrix": [[1.0, 0.0]],
            "feedback_gain": [[0.4, 0.0]],
            "feedforward_gain": [[1.0]],
            "observer_gain": [[0.5], [0.0]]
        });

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();

        let gains = ControlGains::load(file.path()).unwrap();
        assert_eq!(gains.nx(), 2);
        assert_eq!(gains.nu(), 1);
        assert_eq!(gains.ny(), 1);
    }

    #[test]
    fn test_load_without_observer_gain_synthesizes() {
        let json = serde_json::json!({
            "state_matrix": [[0.9, 0.0], [0.0, 0.8]],
            "input_matrix": [[1.0], [0.0]],
            "output_matrix": [[1.0, 0.5]],
            "feedback_gain": [[0.4, 0.0]],
            "feedforward_gain": [[1.0]]
        });

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();

        let gains = ControlGains::load(file.path()).unwrap();
        let radius = spectral_radius(&(&gains.a - &gains.l * &gains.c));
        assert!(radius < 1.0);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ControlGains::load("/nonexistent/gains.json").is_err());
    }
}
