/// コア型定義
///
/// Domain層の中心となるデータ構造。
/// 3つのアクター（知覚・コンソール・制御）間で共有される不変の型。

use nalgebra::Vector3;

/// 制御則の種別
///
/// オペレーターが希望するモードと、制御ループが実際に実行している
/// モード（arbitrated mode）の両方にこの型を使用する。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// 開ループ: オペレーターの生の参照値をそのままモーター角度として使用
    #[default]
    OpenLoop,
    /// 閉ループ: 状態フィードバック + フィードフォワード（G·r − K·x̂）
    ClosedLoop,
}

impl ControlMode {
    /// 表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenLoop => "Open Loop",
            Self::ClosedLoop => "Closed Loop",
        }
    }
}

/// センサーピクセル空間のマーカー重心
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMarker {
    pub px: f64,
    pub py: f64,
}

impl PixelMarker {
    pub fn new(px: f64, py: f64) -> Self {
        Self { px, py }
    }
}

/// 現フレームの物理マーカー位置集合
///
/// 不変条件: 常にちょうどN個の点を保持する。検出数がNに満たない
/// サイクルでは前回の集合を部分更新せずそのまま再利用する。
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSet {
    points: Vec<Vector3<f64>>,
}

impl MarkerSet {
    /// 新しいMarkerSetを作成
    ///
    /// 点数は呼び出し側がN個に揃えてから渡すこと。
    pub fn new(points: Vec<Vector3<f64>>) -> Self {
        Self { points }
    }

    /// マーカー数
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 点集合への参照
    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// 制御モデルの観測次元に対応する成分（各点の成分1と2）を
    /// 平坦化して取り出す（長さ2N）
    pub fn measured_components(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.points.len() * 2);
        for p in &self.points {
            out.push(p[1]);
            out.push(p[2]);
        }
        out
    }
}

/// オペレーターの操作
///
/// コンソールアクターはこの列挙型を受信し、§コンソール状態機械の
/// 全域遷移関数で処理する。無効な操作は黙って無視される。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorAction {
    /// アーム（ワンショット、NotArmed → Armed/Active）
    Arm,
    /// アクティブ/非アクティブの切り替え（Armedのみ有効）
    ToggleActive,
    /// 希望モードの変更（ラベルのみ、公開はCommitModeで行う）
    SelectMode(ControlMode),
    /// 希望モードを共有領域に公開し、updatePendingを立てる
    CommitMode,
    /// 開ループ系の手動軸調整（モーター角度、ラジアン）
    AdjustMotor { axis: usize, angle_rad: f64 },
    /// 閉ループ系の手動軸調整（デカルト参照、mm）
    AdjustReference { axis: usize, millimeters: f64 },
}
