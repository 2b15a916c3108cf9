/// Port定義（外部ドライバとの境界）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Supervisorが各アクターに注入する。
/// 各ドライバは対応するアクタースレッドが単独で所有する。

use crate::domain::{DomainResult, PixelMarker};

/// カメラポート: フレーム取得とマーカー重心検出を抽象化
///
/// 深度カメラドライバと生ポイントクラウド抽出は外部協力者として扱い、
/// ここではピクセル重心と固定作業深度のみを受け取る。
pub trait CameraPort: Send {
    /// 次のフレームが取得できるまでブロックする
    ///
    /// 知覚アクターがブロックするのはこの呼び出しの内部のみ。
    ///
    /// # Returns
    /// - `Ok(())`: フレーム取得成功
    /// - `Err(DomainError)`: 取得失敗。致命的で、アクターを終了させる
    fn wait_frame(&mut self) -> DomainResult<()>;

    /// 現フレームで検出されたマーカー重心（ピクセル座標）
    ///
    /// 一時的な検出不足ではN個未満を返してよい。呼び出し側は
    /// その場合に前回の物理空間結果をそのまま再利用する。
    fn marker_pixels(&mut self) -> DomainResult<Vec<PixelMarker>>;
}

/// モーターポート: アクチュエータ駆動トランスポートを抽象化
///
/// 4軸の角度指令（ラジアン）を受け、測定角度を返す。
/// 原点角度オフセットの合成・補正は呼び出し側（制御アクター）が行う。
pub trait MotorPort: Send {
    /// ドライバをオープンする（1回の試行）
    ///
    /// 有限回の再試行ポリシーはApplication層が実装する。
    fn open(&mut self) -> DomainResult<()>;

    /// 角度指令を送信する
    ///
    /// # Arguments
    /// - `angles`: 4軸の角度（軸0,2が制御対象、軸1,3は固定保持）
    fn send_angles(&mut self, angles: &[f64; 4]) -> DomainResult<()>;

    /// 実際に到達した角度を読み戻す
    fn read_angles(&mut self) -> DomainResult<[f64; 4]>;
}
