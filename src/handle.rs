//! 전송 핸들 (외부에서 제어용)
//!
//! 실행 중 플래그와 통계 스냅샷을 다른 태스크와 공유

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::stats::TransferStats;

/// 정지 플래그 확인 주기 (긴 대기를 이 단위로 나눔)
pub(crate) const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 전송 핸들
#[derive(Debug, Clone)]
pub struct TransferHandle {
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<TransferStats>>,
}

impl TransferHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(RwLock::new(TransferStats::new())),
        }
    }

    /// 정지 요청 (루프 반복마다 확인됨)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }

    /// 통계 갱신
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut TransferStats),
    {
        f(&mut self.stats.write());
    }
}

impl Default for TransferHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_shared_between_clones() {
        let handle = TransferHandle::new();
        let observer = handle.clone();

        assert!(observer.is_running());
        handle.stop();
        assert!(!observer.is_running());
    }

    #[test]
    fn test_stats_snapshot() {
        let handle = TransferHandle::new();
        handle.update(|s| s.packets_sent += 3);
        assert_eq!(handle.clone().stats().packets_sent, 3);
    }
}
