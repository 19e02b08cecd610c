//! 송신자 (GBN 송신측)
//!
//! - READY 대기 후 세션 시작 (세션은 한 번만)
//! - 윈도우 크기만큼 미리 전송
//! - 누적 ACK로 윈도우 전진
//! - 타임아웃 시 base부터 윈도우 전체 재전송

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::fragment::{fragment, Fragment};
use crate::handle::{TransferHandle, STOP_POLL_INTERVAL};
use crate::link::Link;
use crate::packet::{ControlMessage, Packet};
use crate::stats::{TransferReport, TransferStats};
use crate::{Config, Error, Result};

/// 전송할 패킷 하나
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub seq: u32,

    /// 이전에 보낸 적 있는 시퀀스인지
    pub retransmit: bool,
}

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// 윈도우 전진 (새로 확인된 패킷 수)
    Advanced(u32),

    /// base보다 앞선 ACK (이미 확인됨)
    Stale,

    /// 아직 보내지 않은 시퀀스에 대한 ACK
    Unsent,
}

/// GBN 송신 윈도우 (소켓 I/O 없음)
///
/// ```text
///   base           next_seq       base + window_size
///     │ <- 미확인 -> │ <- 전송 가능 -> │
/// ```
///
/// 불변식: `base <= next_seq <= min(base + window_size, total)`
#[derive(Debug, Clone)]
pub struct GbnWindow {
    base: u32,
    next_seq: u32,
    total: u32,
    window_size: u32,

    /// 지금까지 한 번이라도 보낸 시퀀스의 끝 (exclusive)
    high_water: u32,
}

impl GbnWindow {
    pub fn new(total: u32, window_size: u32) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        Ok(Self {
            base: 0,
            next_seq: 0,
            total,
            window_size,
            high_water: 0,
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// 미확인 패킷 수
    pub fn in_flight(&self) -> u32 {
        self.next_seq - self.base
    }

    fn limit(&self) -> u32 {
        self.base.saturating_add(self.window_size).min(self.total)
    }

    pub fn can_send(&self) -> bool {
        self.next_seq < self.limit()
    }

    /// 윈도우에 여유가 있으면 다음 시퀀스를 꺼냄
    pub fn next_to_send(&mut self) -> Option<Transmission> {
        if !self.can_send() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let retransmit = seq < self.high_water;
        self.high_water = self.high_water.max(self.next_seq);

        Some(Transmission { seq, retransmit })
    }

    /// 누적 ACK 처리 (`n`까지 모두 수신됨)
    pub fn on_ack(&mut self, n: u32) -> AckOutcome {
        if n < self.base {
            return AckOutcome::Stale;
        }
        if n >= self.high_water {
            return AckOutcome::Unsent;
        }

        let advanced = n + 1 - self.base;
        self.base = n + 1;
        self.next_seq = self.next_seq.max(self.base);
        AckOutcome::Advanced(advanced)
    }

    /// 타임아웃: next_seq를 base로 되돌림 (Go-Back-N)
    ///
    /// 되돌린 패킷 수 반환. 이후 `next_to_send`가 같은 구간을 다시 내보냄
    pub fn on_timeout(&mut self) -> u32 {
        let rewound = self.in_flight();
        self.next_seq = self.base;
        rewound
    }

    pub fn is_complete(&self) -> bool {
        self.base == self.total
    }
}

/// 송신자 (전송 한 번에 하나)
pub struct Sender {
    config: Config,
    link: Link,
    handle: TransferHandle,
    peer: Option<SocketAddr>,
}

impl Sender {
    /// 소켓 바인딩 후 송신자 생성
    pub async fn bind(config: Config, bind_addr: SocketAddr) -> Result<Self> {
        config.validate()?;
        let link = Link::bind(bind_addr, config.recv_buffer_size).await?;
        Self::from_link(config, link)
    }

    /// 준비된 링크로 송신자 생성 (장애 주입 등)
    pub fn from_link(config: Config, link: Link) -> Result<Self> {
        config.validate()?;
        info!("GBN Sender started on {}", link.local_addr()?);

        Ok(Self {
            config,
            link,
            handle: TransferHandle::new(),
            peer: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.link.local_addr()
    }

    /// 제어 핸들 (정지, 통계 조회)
    pub fn handle(&self) -> TransferHandle {
        self.handle.clone()
    }

    /// 세션 상대 주소 (READY 이후)
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// READY 대기
    ///
    /// 핸드쉐이크 타임아웃 안에 READY가 없으면 실패 (재시도 없음)
    pub async fn wait_ready(&mut self) -> Result<SocketAddr> {
        if let Some(peer) = self.peer {
            return Ok(peer);
        }

        let timeout = self.config.handshake_timeout();
        let deadline = Instant::now() + timeout;
        info!("Waiting for READY ({}ms)...", self.config.handshake_timeout_ms);

        loop {
            if !self.handle.is_running() {
                return Err(Error::Cancelled {
                    completed: 0,
                    total: None,
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("READY 대기 타임아웃");
                return Err(Error::HandshakeTimeout {
                    waited_ms: self.config.handshake_timeout_ms,
                });
            }

            let Some((datagram, addr)) = self.link.recv_from(remaining.min(STOP_POLL_INTERVAL)).await? else {
                continue;
            };

            match ControlMessage::from_bytes(&datagram) {
                Ok(ControlMessage::Ready) => {
                    info!("READY received from {}", addr);
                    self.peer = Some(addr);
                    return Ok(addr);
                }
                Ok(other) => {
                    debug!("핸드쉐이크 중 무시: {} from {}", other, addr);
                }
                Err(e) => {
                    warn!("핸드쉐이크 중 잘못된 메시지 ({}): {}", addr, e);
                    self.handle.update(|s| s.malformed_datagrams += 1);
                }
            }
        }
    }

    /// 데이터 전송 (분할 → READY 대기 → GBN 전송)
    ///
    /// 송신자를 소비함: 전송이 끝나면 소켓 해제
    pub async fn send(mut self, data: Bytes) -> Result<TransferReport> {
        let fragments = fragment(&data, self.config.max_payload)?;
        info!(
            "Data split into {} fragments ({} bytes, max payload {})",
            fragments.len(),
            data.len(),
            self.config.max_payload
        );

        let peer = self.wait_ready().await?;
        self.transmit(&fragments, peer).await
    }

    /// GBN 전송 루프
    pub async fn transmit(&mut self, fragments: &[Fragment], peer: SocketAddr) -> Result<TransferReport> {
        let total = u32::try_from(fragments.len())
            .map_err(|_| Error::TooManyFragments { count: fragments.len() })?;
        if total == 0 {
            return Err(Error::EmptyPayload);
        }

        let payload_bytes: u64 = fragments.iter().map(|f| f.len() as u64).sum();
        self.handle.update(|s| {
            *s = TransferStats {
                total_fragments: total,
                total_bytes: payload_bytes,
                // 핸드쉐이크 중 통계 유지
                malformed_datagrams: s.malformed_datagrams,
                ..TransferStats::new()
            };
        });

        let mut window = GbnWindow::new(total, self.config.window_size)?;
        let ack_timeout = self.config.ack_timeout();
        let mut deadline = Instant::now() + ack_timeout;
        let mut consecutive_timeouts = 0u32;

        info!(
            "Starting GBN transfer to {}: {} fragments, window {}",
            peer, total, self.config.window_size
        );

        while !window.is_complete() {
            if !self.handle.is_running() {
                warn!("전송 취소: {}/{} 확인됨", window.base(), total);
                return Err(Error::Cancelled {
                    completed: window.base(),
                    total: Some(total),
                });
            }

            // 1. 윈도우 채우기
            while let Some(tx) = window.next_to_send() {
                let packet = Packet::from_fragment(&fragments[tx.seq as usize], total);
                let wire_len = packet.wire_len() as u64;
                self.link.send_to(packet.to_bytes(), peer).await?;

                debug!("패킷 {} 전송 (retransmit={})", tx.seq, tx.retransmit);

                let in_flight = window.in_flight();
                self.handle.update(|s| {
                    s.packets_sent += 1;
                    s.wire_bytes_sent += wire_len;
                    if tx.retransmit {
                        s.retransmitted_packets += 1;
                    }
                    s.max_in_flight = s.max_in_flight.max(in_flight);
                });
            }

            // 2. ACK 하나 대기
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.link.recv_from(remaining.min(STOP_POLL_INTERVAL)).await? {
                Some((datagram, addr)) => {
                    if addr != peer {
                        debug!("세션 외 주소 무시: {}", addr);
                        continue;
                    }

                    match ControlMessage::from_bytes(&datagram) {
                        Ok(ControlMessage::Ack(n)) => match window.on_ack(n) {
                            AckOutcome::Advanced(count) => {
                                debug!("ACK:{} → base {} (+{})", n, window.base(), count);
                                consecutive_timeouts = 0;
                                deadline = Instant::now() + ack_timeout;

                                let base = window.base();
                                self.handle.update(|s| {
                                    s.acks_received += 1;
                                    s.completed_fragments = base;
                                });
                            }
                            AckOutcome::Stale => {
                                debug!("지난 ACK:{} 무시 (base {})", n, window.base());
                                self.handle.update(|s| {
                                    s.acks_received += 1;
                                    s.stale_acks += 1;
                                });
                            }
                            AckOutcome::Unsent => {
                                warn!("보내지 않은 시퀀스에 대한 ACK:{} 무시", n);
                                self.handle.update(|s| s.malformed_datagrams += 1);
                            }
                        },
                        Ok(ControlMessage::Ready) => {
                            debug!("세션 진행 중 중복 READY 무시: {}", addr);
                            self.handle.update(|s| s.duplicate_ready += 1);
                        }
                        Err(e) => {
                            warn!("잘못된 컨트롤 메시지 무시: {}", e);
                            self.handle.update(|s| s.malformed_datagrams += 1);
                        }
                    }
                }
                None if Instant::now() < deadline => {}
                None => {
                    // 3. 타임아웃: 윈도우 전체 재전송
                    consecutive_timeouts += 1;
                    self.handle.update(|s| s.timeouts += 1);

                    if let Some(max) = self.config.max_retransmissions {
                        if consecutive_timeouts > max {
                            warn!(
                                "재전송 한도 초과: base={}, {}회 연속 타임아웃",
                                window.base(),
                                consecutive_timeouts
                            );
                            return Err(Error::RetransmissionLimitExceeded {
                                base: window.base(),
                                attempts: consecutive_timeouts,
                            });
                        }
                    }

                    let rewound = window.on_timeout();
                    warn!(
                        "ACK 타임아웃: base={}부터 {}개 재전송 (연속 {}회)",
                        window.base(),
                        rewound,
                        consecutive_timeouts
                    );
                    deadline = Instant::now() + ack_timeout;
                }
            }
        }

        let report = TransferReport::from_stats(self.handle.stats());
        info!("Transfer complete: {}", report.summary());
        info!("  {}", report.stats.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(window: &mut GbnWindow) -> Vec<u32> {
        std::iter::from_fn(|| window.next_to_send().map(|t| t.seq)).collect()
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(GbnWindow::new(10, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_fill_respects_window() {
        let mut w = GbnWindow::new(25, 10).unwrap();
        assert_eq!(drain(&mut w), (0..10u32).collect::<Vec<_>>());
        assert_eq!(w.in_flight(), 10);
        assert!(!w.can_send());
    }

    #[test]
    fn test_fill_stops_at_total() {
        let mut w = GbnWindow::new(4, 10).unwrap();
        assert_eq!(drain(&mut w), vec![0, 1, 2, 3]);
        assert_eq!(w.next_seq(), 4);
    }

    #[test]
    fn test_cumulative_ack_slides_multiple() {
        let mut w = GbnWindow::new(20, 5).unwrap();
        drain(&mut w);

        // ACK:0, ACK:1 손실 후 ACK:2
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(3));
        assert_eq!(w.base(), 3);
        assert_eq!(drain(&mut w), vec![5, 6, 7]);
        assert_eq!(w.in_flight(), 5);
    }

    #[test]
    fn test_stale_and_unsent_acks_ignored() {
        let mut w = GbnWindow::new(20, 5).unwrap();
        drain(&mut w);
        w.on_ack(1);

        assert_eq!(w.on_ack(0), AckOutcome::Stale);
        assert_eq!(w.on_ack(9), AckOutcome::Unsent);
        assert_eq!(w.base(), 2);
    }

    #[test]
    fn test_timeout_goes_back_n() {
        let mut w = GbnWindow::new(20, 4).unwrap();
        drain(&mut w);
        w.on_ack(0);
        drain(&mut w);
        assert_eq!((w.base(), w.next_seq()), (1, 5));

        assert_eq!(w.on_timeout(), 4);
        assert_eq!(w.next_seq(), 1);

        let resent: Vec<Transmission> = std::iter::from_fn(|| w.next_to_send()).collect();
        assert_eq!(resent.iter().map(|t| t.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(resent.iter().all(|t| t.retransmit));
    }

    #[test]
    fn test_late_ack_after_rewind_still_counts() {
        let mut w = GbnWindow::new(10, 4).unwrap();
        drain(&mut w);
        w.on_timeout();

        // 되돌린 뒤 도착한 ACK:2 (이전 전송분)
        assert_eq!(w.on_ack(2), AckOutcome::Advanced(3));
        assert_eq!(w.base(), 3);
        assert_eq!(w.next_seq(), 3);

        let next: Vec<Transmission> = std::iter::from_fn(|| w.next_to_send()).collect();
        assert_eq!(next[0], Transmission { seq: 3, retransmit: true });
        assert_eq!(next[1], Transmission { seq: 4, retransmit: false });
    }

    #[test]
    fn test_window_never_exceeds_size() {
        let mut w = GbnWindow::new(100, 7).unwrap();
        let mut acked = 0;
        while !w.is_complete() {
            drain(&mut w);
            assert!(w.in_flight() <= 7);
            w.on_ack(acked.min(w.next_seq() - 1));
            acked += 3;
        }
        assert_eq!(w.base(), 100);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = Config {
            handshake_timeout_ms: 50,
            ..Config::local_test()
        };
        let sender = Sender::bind(config, "127.0.0.1:0".parse().unwrap()).await.unwrap();

        let err = sender.send(Bytes::from_static(b"nobody listens")).await.unwrap_err();
        assert!(matches!(err, Error::HandshakeTimeout { waited_ms: 50 }));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected_before_handshake() {
        let sender = Sender::bind(Config::local_test(), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert!(matches!(
            sender.send(Bytes::new()).await,
            Err(Error::EmptyPayload)
        ));
    }
}
