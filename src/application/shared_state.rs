//! アクター間共有状態領域
//!
//! 3つのアクターが共有する唯一の可変状態。論理フィールドごとに
//! 独立したMutexを1つずつ持ち、フィールド単位の原子性のみを保証する。
//! フィールドを跨ぐトランザクションは提供しない（モードと参照値の
//! 読み取りスキューは仕様として許容される）。
//!
//! 加えて2つの二値イベントを公開する:
//! - `frame_acquired`: 知覚サイクルごとの生存ハートビート
//! - `measurement_ready`: MarkerSet書き込み後のみ、かつアーム中のみ
//!   発火する。制御ループが待つ唯一のシグナル。

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::domain::ControlMode;

/// 二値シグナルイベント（Mutex + Condvar）
///
/// 待機側が消費する（wait成功でフラグをクリアする）セマンティクス。
pub struct SignalEvent {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl SignalEvent {
    pub fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// イベントをセットして待機側を起こす
    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.cond.notify_all();
    }

    /// セットされるまで最大timeoutだけブロックし、消費する
    ///
    /// # Returns
    /// - `true`: イベントを消費した
    /// - `false`: タイムアウト（フラグ未セットのまま）
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock().unwrap();

        while !*flag {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.cond.wait_timeout(flag, deadline - now).unwrap();
            flag = guard;
            if result.timed_out() && !*flag {
                return false;
            }
        }

        *flag = false;
        true
    }

    /// ノンブロッキングで消費を試みる（ハートビート確認用）
    pub fn take(&self) -> bool {
        let mut flag = self.flag.lock().unwrap();
        std::mem::replace(&mut *flag, false)
    }
}

impl Default for SignalEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// updatePending消費時に読み取るコマンドスナップショット
///
/// 各フィールドは個別のロック下で読まれる。クリアと読み取りの間に
/// 書き込みが割り込んだ場合、スナップショットはより新しい値になる
/// だけで、更新が失われることはない（次ステップで再度検出される）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandUpdate {
    pub mode: ControlMode,
    pub open_loop_ref: [f64; 2],
    pub closed_loop_ref: [f64; 2],
}

/// 共有状態領域
///
/// アクター起動前に一度だけ確保され、シャットダウンまで生存する。
/// フィールドごとに書き込み主体は1つ:
/// - marker_positions: 知覚アクター
/// - ref_open_loop / ref_closed_loop / armed / mode / update_pending: コンソール
///   （update_pendingのクリアのみ制御アクター）
pub struct SharedStateRegion {
    /// 物理マーカー位置（観測成分、長さ2N）
    marker_positions: Mutex<Vec<f64>>,
    /// 開ループ参照（モーター角度、ラジアン）
    ref_open_loop: Mutex<[f64; 2]>,
    /// 閉ループ参照（デカルト、mm）
    ref_closed_loop: Mutex<[f64; 2]>,
    /// アーム済みか（ワンショット）
    armed: Mutex<bool>,
    /// コミット済みの制御モード
    mode: Mutex<ControlMode>,
    /// コマンド更新の保留フラグ
    update_pending: Mutex<bool>,

    /// 知覚サイクルごとの生存ハートビート（データ準備の合図ではない）
    pub frame_acquired: SignalEvent,
    /// 測定値公開の合図。制御ループが待つ唯一のシグナル
    pub measurement_ready: SignalEvent,
}

impl SharedStateRegion {
    /// 新しい共有領域を確保する（全フィールドゼロ初期化）
    pub fn new(marker_count: usize) -> Self {
        Self {
            marker_positions: Mutex::new(vec![0.0; 2 * marker_count]),
            ref_open_loop: Mutex::new([0.0; 2]),
            ref_closed_loop: Mutex::new([0.0; 2]),
            armed: Mutex::new(false),
            mode: Mutex::new(ControlMode::default()),
            update_pending: Mutex::new(false),
            frame_acquired: SignalEvent::new(),
            measurement_ready: SignalEvent::new(),
        }
    }

    // ===== 知覚アクター側 =====

    /// 測定値を公開する（ガード保持は最小のコピー時間のみ）
    pub fn publish_markers(&self, values: &[f64]) {
        let mut markers = self.marker_positions.lock().unwrap();
        debug_assert_eq!(markers.len(), values.len());
        markers.copy_from_slice(values);
    }

    /// 最新の測定値を読み取る
    pub fn read_markers(&self) -> Vec<f64> {
        self.marker_positions.lock().unwrap().clone()
    }

    // ===== コンソール側 =====

    pub fn set_armed(&self, armed: bool) {
        *self.armed.lock().unwrap() = armed;
    }

    pub fn is_armed(&self) -> bool {
        *self.armed.lock().unwrap()
    }

    pub fn write_open_loop_ref(&self, reference: [f64; 2]) {
        *self.ref_open_loop.lock().unwrap() = reference;
    }

    pub fn write_closed_loop_ref(&self, reference: [f64; 2]) {
        *self.ref_closed_loop.lock().unwrap() = reference;
    }

    pub fn open_loop_ref(&self) -> [f64; 2] {
        *self.ref_open_loop.lock().unwrap()
    }

    pub fn closed_loop_ref(&self) -> [f64; 2] {
        *self.ref_closed_loop.lock().unwrap()
    }

    /// 希望モードを公開する（独立した単一フィールドコミット）
    pub fn commit_mode(&self, mode: ControlMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// コミット済みモードを読み取る
    ///
    /// コンソールが再アクティブ化時に参照するのはこの値であり、
    /// 自身の未コミットの希望モードではない。
    pub fn committed_mode(&self) -> ControlMode {
        *self.mode.lock().unwrap()
    }

    pub fn set_update_pending(&self) {
        *self.update_pending.lock().unwrap() = true;
    }

    // ===== 制御アクター側 =====

    /// 保留中のコマンド更新を消費する（単一消費者クリア方式）
    ///
    /// フラグを自身のロック下でクリアしてから、モードと両参照を
    /// それぞれのロック下で読む。フィールド跨ぎの原子性はない。
    pub fn take_command_update(&self) -> Option<CommandUpdate> {
        {
            let mut pending = self.update_pending.lock().unwrap();
            if !*pending {
                return None;
            }
            *pending = false;
        }

        Some(CommandUpdate {
            mode: self.committed_mode(),
            open_loop_ref: self.open_loop_ref(),
            closed_loop_ref: self.closed_loop_ref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_event_set_then_wait() {
        let event = SignalEvent::new();
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(1)));
        // 消費済みなので2回目はタイムアウト
        assert!(!event.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_event_wait_timeout() {
        let event = SignalEvent::new();
        let start = std::time::Instant::now();
        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_event_wakes_waiter() {
        let event = Arc::new(SignalEvent::new());
        let waiter = {
            let event = Arc::clone(&event);
            std::thread::spawn(move || event.wait_timeout(Duration::from_secs(5)))
        };

        std::thread::sleep(Duration::from_millis(10));
        event.set();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_event_take() {
        let event = SignalEvent::new();
        assert!(!event.take());
        event.set();
        assert!(event.take());
        assert!(!event.take());
    }

    #[test]
    fn test_markers_roundtrip() {
        let region = SharedStateRegion::new(3);
        assert_eq!(region.read_markers(), vec![0.0; 6]);

        region.publish_markers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(region.read_markers(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_take_command_update_consumes_flag() {
        let region = SharedStateRegion::new(3);
        assert!(region.take_command_update().is_none());

        region.write_open_loop_ref([0.1, -0.2]);
        region.commit_mode(ControlMode::ClosedLoop);
        region.set_update_pending();

        let update = region.take_command_update().unwrap();
        assert_eq!(update.mode, ControlMode::ClosedLoop);
        assert_eq!(update.open_loop_ref, [0.1, -0.2]);

        // 単一消費者クリア: 2回目は無し
        assert!(region.take_command_update().is_none());
    }

    #[test]
    fn test_rapid_writes_not_lost() {
        let region = SharedStateRegion::new(3);

        // 連続書き込み後でもフラグは1回の消費で最新値を返す
        region.write_closed_loop_ref([1.0, 1.0]);
        region.set_update_pending();
        region.write_closed_loop_ref([2.0, 2.0]);
        region.set_update_pending();

        let update = region.take_command_update().unwrap();
        assert_eq!(update.closed_loop_ref, [2.0, 2.0]);
    }

    #[test]
    fn test_per_field_atomicity_under_concurrent_writers() {
        let region = Arc::new(SharedStateRegion::new(3));

        let writer = {
            let region = Arc::clone(&region);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    let v = i as f64;
                    region.publish_markers(&[v; 6]);
                }
            })
        };

        // 読み手は常に単一書き込みの完全な値を見る（部分書き込み無し）
        for _ in 0..1000 {
            let markers = region.read_markers();
            let first = markers[0];
            assert!(markers.iter().all(|&m| m == first));
        }

        writer.join().unwrap();
    }
}
