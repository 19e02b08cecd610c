//! 수신자 (GBN 수신측)
//!
//! - READY 한 번 전송 후 데이터 대기
//! - 첫 패킷의 total로 수신 버퍼 크기 결정
//! - 기대 시퀀스만 저장, 중복/순서 어긋남은 폐기 후 누적 ACK 재전송
//! - 전부 받으면 시퀀스 순서로 이어붙여 복원

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::fragment::Reassembly;
use crate::handle::{TransferHandle, STOP_POLL_INTERVAL};
use crate::link::Link;
use crate::packet::{ControlMessage, Packet};
use crate::stats::TransferReport;
use crate::{Config, Error, Result};

/// 패킷 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 기대 시퀀스: 저장 후 전진
    Accepted,

    /// 이미 받은 시퀀스 (ACK 손실로 인한 재전송)
    Duplicate,

    /// 기대보다 앞선 시퀀스 (폐기)
    OutOfOrder,

    /// 세션과 맞지 않는 헤더 (폐기, ACK 없음)
    Rejected,
}

/// GBN 수신 상태 (소켓 I/O 없음)
///
/// `buffer[i]`는 `i < expected`일 때만 채워져 있음
#[derive(Debug, Default)]
pub struct GbnReceiver {
    expected: u32,
    buffer: Option<Reassembly>,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 기대 시퀀스 번호
    pub fn expected_seq(&self) -> u32 {
        self.expected
    }

    /// 총 프래그먼트 수 (첫 패킷 전에는 None)
    pub fn total(&self) -> Option<u32> {
        self.buffer.as_ref().map(Reassembly::total)
    }

    /// 지금까지 저장된 바이트 수
    pub fn partial_bytes(&self) -> usize {
        self.buffer.as_ref().map_or(0, Reassembly::bytes)
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.as_ref().is_some_and(Reassembly::is_complete)
    }

    /// 보낼 누적 ACK 번호 (아무것도 받지 못했으면 None)
    pub fn ack(&self) -> Option<u32> {
        self.expected.checked_sub(1)
    }

    /// 패킷 처리
    pub fn on_packet(&mut self, packet: Packet) -> Delivery {
        if self.buffer.is_none() {
            if packet.total == 0 {
                return Delivery::Rejected;
            }
            self.buffer = Some(Reassembly::with_total(packet.total));
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Delivery::Rejected;
        };

        if packet.total != buffer.total() || packet.seq >= buffer.total() {
            return Delivery::Rejected;
        }

        if packet.seq == self.expected {
            buffer.push(packet.seq, packet.payload);
            self.expected += 1;
            Delivery::Accepted
        } else if packet.seq < self.expected {
            Delivery::Duplicate
        } else {
            Delivery::OutOfOrder
        }
    }

    /// 복원된 데이터 (완료되지 않았으면 None)
    pub fn into_bytes(self) -> Option<Bytes> {
        self.buffer.and_then(Reassembly::into_bytes)
    }
}

/// 수신 완료된 파일
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub data: Bytes,
    pub report: TransferReport,
}

/// 수신자 (전송 한 번에 하나)
pub struct Receiver {
    config: Config,
    link: Link,
    sender_addr: SocketAddr,
    handle: TransferHandle,
}

impl Receiver {
    /// 소켓 바인딩 후 수신자 생성
    pub async fn bind(config: Config, bind_addr: SocketAddr, sender_addr: SocketAddr) -> Result<Self> {
        config.validate()?;
        let link = Link::bind(bind_addr, config.recv_buffer_size).await?;
        Self::from_link(config, link, sender_addr)
    }

    /// 준비된 링크로 수신자 생성 (장애 주입 등)
    pub fn from_link(config: Config, link: Link, sender_addr: SocketAddr) -> Result<Self> {
        config.validate()?;
        info!(
            "GBN Receiver started on {}, sender: {}",
            link.local_addr()?,
            sender_addr
        );

        Ok(Self {
            config,
            link,
            sender_addr,
            handle: TransferHandle::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.link.local_addr()
    }

    /// 제어 핸들 (정지, 통계 조회)
    pub fn handle(&self) -> TransferHandle {
        self.handle.clone()
    }

    /// READY 전송
    pub async fn send_ready(&mut self) -> Result<()> {
        self.link
            .send_to(ControlMessage::Ready.to_bytes(), self.sender_addr)
            .await?;
        info!("READY sent to {}", self.sender_addr);
        Ok(())
    }

    /// 파일 수신 (READY → GBN 수신 → 복원)
    ///
    /// 수신자를 소비함: 끝나면 소켓 해제
    pub async fn receive(mut self) -> Result<ReceivedFile> {
        self.send_ready().await?;
        self.receive_after_ready().await
    }

    /// READY 이후의 수신 루프
    pub async fn receive_after_ready(mut self) -> Result<ReceivedFile> {
        self.handle.update(|s| s.start_time = Instant::now());

        let mut state = GbnReceiver::new();
        let recv_timeout = self.config.recv_timeout();
        let mut deadline = Instant::now() + recv_timeout;

        while !state.is_complete() {
            if !self.handle.is_running() {
                warn!(
                    "수신 취소: {}/{:?} 프래그먼트, {} bytes (부분 파일 폐기)",
                    state.expected_seq(),
                    state.total(),
                    state.partial_bytes()
                );
                return Err(Error::Cancelled {
                    completed: state.expected_seq(),
                    total: state.total(),
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    "수신 타임아웃: {}/{:?} 프래그먼트, 부분 {} bytes",
                    state.expected_seq(),
                    state.total(),
                    state.partial_bytes()
                );
                return Err(Error::TransferTimeout {
                    received: state.expected_seq(),
                    total: state.total(),
                    partial_bytes: state.partial_bytes(),
                });
            }

            let Some((datagram, addr)) = self.link.recv_from(remaining.min(STOP_POLL_INTERVAL)).await? else {
                continue;
            };

            if addr != self.sender_addr {
                debug!("송신자 외 주소 무시: {}", addr);
                continue;
            }

            let packet = match Packet::from_bytes(&datagram) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("데이터그램 폐기: {}", e);
                    self.handle.update(|s| s.malformed_datagrams += 1);
                    continue;
                }
            };

            let seq = packet.seq;
            let first = state.total().is_none();
            let delivery = state.on_packet(packet);

            if first && state.total().is_some() {
                info!("Total fragments to receive: {}", state.total().unwrap_or(0));
            }

            match delivery {
                Delivery::Accepted => debug!("패킷 {} 저장", seq),
                Delivery::Duplicate => debug!("중복 패킷 {} (기대 {})", seq, state.expected_seq()),
                Delivery::OutOfOrder => debug!("순서 어긋난 패킷 {} 폐기 (기대 {})", seq, state.expected_seq()),
                Delivery::Rejected => warn!("세션과 맞지 않는 패킷 {} 폐기", seq),
            }

            let expected = state.expected_seq();
            let total = state.total().unwrap_or(0);
            let partial = state.partial_bytes() as u64;
            self.handle.update(|s| {
                s.packets_received += 1;
                s.total_fragments = total;
                s.completed_fragments = expected;
                s.total_bytes = partial;
                match delivery {
                    Delivery::Accepted => {}
                    Delivery::Duplicate => s.duplicate_packets += 1,
                    Delivery::OutOfOrder => s.out_of_order_packets += 1,
                    Delivery::Rejected => s.malformed_datagrams += 1,
                }
            });

            if delivery == Delivery::Rejected {
                continue;
            }
            // 세션에 맞는 패킷만 활동으로 인정
            deadline = Instant::now() + recv_timeout;

            // 누적 ACK (받은 것이 없으면 보내지 않음)
            if let Some(n) = state.ack() {
                self.link
                    .send_to(ControlMessage::Ack(n).to_bytes(), self.sender_addr)
                    .await?;
                self.handle.update(|s| s.acks_sent += 1);
            }

            if total > 0 && expected % 50 == 0 && delivery == Delivery::Accepted {
                info!(
                    "Progress: {:.1}% ({}/{} fragments)",
                    expected as f64 * 100.0 / total as f64,
                    expected,
                    total
                );
            }
        }

        let report = TransferReport::from_stats(self.handle.stats());
        let data = state.into_bytes().ok_or(Error::TransferTimeout {
            received: report.fragments,
            total: Some(report.fragments),
            partial_bytes: report.bytes as usize,
        })?;

        info!("Transfer complete: {}", report.summary());
        info!("  {}", report.stats.summary());

        Ok(ReceivedFile { data, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(seq: u32, total: u32, body: &'static [u8]) -> Packet {
        Packet::new(seq, total, Bytes::from_static(body))
    }

    #[test]
    fn test_first_packet_sets_total() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.total(), None);
        assert_eq!(r.ack(), None);

        assert_eq!(r.on_packet(pkt(0, 3, b"a")), Delivery::Accepted);
        assert_eq!(r.total(), Some(3));
        assert_eq!(r.ack(), Some(0));
    }

    #[test]
    fn test_out_of_order_discarded_until_gap_filled() {
        let mut r = GbnReceiver::new();
        r.on_packet(pkt(0, 3, b"a"));

        // 2가 1보다 먼저 도착
        assert_eq!(r.on_packet(pkt(2, 3, b"c")), Delivery::OutOfOrder);
        assert_eq!(r.ack(), Some(0));
        assert_eq!(r.on_packet(pkt(1, 3, b"b")), Delivery::Accepted);
        assert!(!r.is_complete());
        assert_eq!(r.on_packet(pkt(2, 3, b"c")), Delivery::Accepted);

        assert!(r.is_complete());
        assert_eq!(r.into_bytes().unwrap(), Bytes::from_static(b"abc"));
    }

    #[test]
    fn test_duplicate_not_restored() {
        let mut r = GbnReceiver::new();
        r.on_packet(pkt(0, 2, b"first"));
        assert_eq!(r.on_packet(pkt(0, 2, b"again")), Delivery::Duplicate);
        assert_eq!(r.partial_bytes(), 5);
        assert_eq!(r.ack(), Some(0));
    }

    #[test]
    fn test_out_of_order_first_packet_still_sets_total() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_packet(pkt(1, 2, b"b")), Delivery::OutOfOrder);
        assert_eq!(r.total(), Some(2));
        assert_eq!(r.ack(), None);
    }

    #[test]
    fn test_mismatched_header_rejected() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_packet(pkt(0, 0, b"")), Delivery::Rejected);
        r.on_packet(pkt(0, 2, b"a"));
        assert_eq!(r.on_packet(pkt(1, 5, b"b")), Delivery::Rejected);
        assert_eq!(r.on_packet(pkt(2, 2, b"c")), Delivery::Rejected);
        assert_eq!(r.expected_seq(), 1);
    }

    #[test]
    fn test_huge_total_header_does_not_preallocate() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_packet(pkt(0, u32::MAX, b"x")), Delivery::Accepted);
        assert_eq!(r.total(), Some(u32::MAX));
        assert_eq!(r.partial_bytes(), 1);
        assert!(!r.is_complete());
    }

    #[test]
    fn test_incomplete_yields_nothing() {
        let mut r = GbnReceiver::new();
        r.on_packet(pkt(0, 2, b"a"));
        assert!(r.into_bytes().is_none());
    }

    #[tokio::test]
    async fn test_timeout_without_sender() {
        let config = Config {
            recv_timeout_ms: 50,
            ..Config::local_test()
        };
        let nobody = "127.0.0.1:9".parse().unwrap();
        let receiver = Receiver::bind(config, "127.0.0.1:0".parse().unwrap(), nobody)
            .await
            .unwrap();

        let err = receiver.receive().await.unwrap_err();
        assert!(matches!(
            err,
            Error::TransferTimeout {
                received: 0,
                total: None,
                partial_bytes: 0
            }
        ));
    }
    #[tokio::test]
    async fn test_elapsed_starts_at_ready() {
        let fake_sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let fake_addr = fake_sender.local_addr().unwrap();
        let receiver = Receiver::bind(Config::local_test(), "127.0.0.1:0".parse().unwrap(), fake_addr)
            .await
            .unwrap();
        let receiver_addr = receiver.local_addr().unwrap();

        // 생성 후 한참 뒤에 수신 시작
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        let task = tokio::spawn(receiver.receive());

        let mut buf = [0u8; 64];
        fake_sender.recv_from(&mut buf).await.unwrap();
        let packet = Packet::new(0, 1, Bytes::from_static(b"x"));
        fake_sender.send_to(&packet.to_bytes(), receiver_addr).await.unwrap();

        let received = task.await.unwrap().unwrap();
        assert_eq!(received.data, Bytes::from_static(b"x"));
        assert!(received.report.elapsed < std::time::Duration::from_millis(400));
    }
}
