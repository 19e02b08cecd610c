//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계 (송신/수신 공용)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 총 프래그먼트 수
    pub total_fragments: u32,

    /// 확인된(송신) 또는 저장된(수신) 프래그먼트 수
    pub completed_fragments: u32,

    /// 페이로드 바이트 (원본 기준)
    pub total_bytes: u64,

    /// 송신 패킷 수 (재전송 포함)
    pub packets_sent: u64,

    /// 와이어로 나간 바이트 (헤더, 재전송 포함)
    pub wire_bytes_sent: u64,

    /// 재전송 패킷 수
    pub retransmitted_packets: u64,

    /// ACK 타임아웃 횟수
    pub timeouts: u64,

    /// 수신 ACK 수
    pub acks_received: u64,

    /// 이미 지나간 ACK 수 (무시됨)
    pub stale_acks: u64,

    /// 송신 ACK 수
    pub acks_sent: u64,

    /// 수신 패킷 수
    pub packets_received: u64,

    /// 중복 수신 패킷 수
    pub duplicate_packets: u64,

    /// 순서 어긋나 폐기한 패킷 수
    pub out_of_order_packets: u64,

    /// 폐기한 잘못된 데이터그램 수
    pub malformed_datagrams: u64,

    /// 세션 시작 후 추가로 받은 READY 수
    pub duplicate_ready: u64,

    /// 관측된 최대 미확인 패킷 수
    pub max_in_flight: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_fragments: 0,
            completed_fragments: 0,
            total_bytes: 0,
            packets_sent: 0,
            wire_bytes_sent: 0,
            retransmitted_packets: 0,
            timeouts: 0,
            acks_received: 0,
            stale_acks: 0,
            acks_sent: 0,
            packets_received: 0,
            duplicate_packets: 0,
            out_of_order_packets: 0,
            malformed_datagrams: 0,
            duplicate_ready: 0,
            max_in_flight: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 실효 처리율 (bytes/sec, 재전송 제외)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율 (재전송 / 전체 송신)
    pub fn retransmission_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.retransmitted_packets as f64 / self.packets_sent as f64
    }

    /// 진행률 (0.0 ~ 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_fragments == 0 {
            return 0.0;
        }
        self.completed_fragments as f64 / self.total_fragments as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Fragments: {}/{} | Bytes: {} | Sent: {} (retx {}) | Timeouts: {} | Recv: {} (dup {}, ooo {}) | ACKs: {} in / {} out",
            self.elapsed().as_secs_f64(),
            self.completed_fragments,
            self.total_fragments,
            self.total_bytes,
            self.packets_sent,
            self.retransmitted_packets,
            self.timeouts,
            self.packets_received,
            self.duplicate_packets,
            self.out_of_order_packets,
            self.acks_received,
            self.acks_sent,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 완료된 전송 보고
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// 프래그먼트 수
    pub fragments: u32,

    /// 원본 바이트 수
    pub bytes: u64,

    /// 소요 시간
    pub elapsed: Duration,

    /// 재전송 패킷 수
    pub retransmissions: u64,

    /// 상세 통계
    pub stats: TransferStats,
}

impl TransferReport {
    pub fn from_stats(stats: TransferStats) -> Self {
        Self {
            fragments: stats.total_fragments,
            bytes: stats.total_bytes,
            elapsed: stats.elapsed(),
            retransmissions: stats.retransmitted_packets,
            stats,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} fragments, {} bytes in {:.2}s, {} retransmissions",
            self.fragments,
            self.bytes,
            self.elapsed.as_secs_f64(),
            self.retransmissions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios_without_traffic() {
        let stats = TransferStats::new();
        assert_eq!(stats.retransmission_ratio(), 0.0);
        assert_eq!(stats.progress(), 0.0);
    }

    #[test]
    fn test_report_copies_counters() {
        let mut stats = TransferStats::new();
        stats.total_fragments = 4;
        stats.completed_fragments = 4;
        stats.total_bytes = 25_000;
        stats.packets_sent = 6;
        stats.retransmitted_packets = 2;

        assert_eq!(stats.progress(), 1.0);
        assert!((stats.retransmission_ratio() - 2.0 / 6.0).abs() < f64::EPSILON);

        let report = TransferReport::from_stats(stats);
        assert_eq!(report.fragments, 4);
        assert_eq!(report.bytes, 25_000);
        assert_eq!(report.retransmissions, 2);
        assert!(report.summary().starts_with("4 fragments, 25000 bytes"));
    }
}
