//! 패킷 포맷 정의
//!
//! 데이터 패킷: `seq(u32 BE) | total(u32 BE) | payload`
//! 컨트롤 메시지: ASCII 텍스트 `READY`, `ACK:<n>`

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::fragment::Fragment;
use crate::{Error, Result, ACK_PREFIX, HEADER_SIZE, READY};

/// 데이터 패킷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 시퀀스 번호 (0 기반)
    pub seq: u32,

    /// 총 프래그먼트 수
    pub total: u32,

    /// 프래그먼트 데이터
    pub payload: Bytes,
}

impl Packet {
    pub fn new(seq: u32, total: u32, payload: Bytes) -> Self {
        Self { seq, total, payload }
    }

    /// 프래그먼트로부터 패킷 생성
    pub fn from_fragment(fragment: &Fragment, total: u32) -> Self {
        Self::new(fragment.seq, total, fragment.data.clone())
    }

    /// 와이어 크기 (헤더 포함)
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u32(self.seq);
        buf.put_u32(self.total);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// 바이트에서 역직렬화
    ///
    /// 헤더(8바이트)보다 짧으면 `MalformedPacket`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::MalformedPacket { len: bytes.len() });
        }

        let mut buf = bytes;
        let seq = buf.get_u32();
        let total = buf.get_u32();

        Ok(Self {
            seq,
            total,
            payload: Bytes::copy_from_slice(buf),
        })
    }
}

/// 컨트롤 메시지 (수신자 → 송신자)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// 수신 준비 완료 (세션 시작 시 한 번)
    Ready,

    /// 누적 ACK: 0..=n 모두 수신
    Ack(u32),
}

impl ControlMessage {
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidControlMessage(String::from_utf8_lossy(bytes).into_owned()))?;
        text.parse()
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Ready => f.write_str(READY),
            ControlMessage::Ack(n) => write!(f, "{}{}", ACK_PREFIX, n),
        }
    }
}

impl std::str::FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim_end_matches(['\0', '\n', '\r']);
        if s == READY {
            return Ok(ControlMessage::Ready);
        }
        s.strip_prefix(ACK_PREFIX)
            .and_then(|n| n.parse::<u32>().ok())
            .map(ControlMessage::Ack)
            .ok_or_else(|| Error::InvalidControlMessage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_big_endian() {
        let packet = Packet::new(1, 4, Bytes::from_static(b"xyz"));
        let bytes = packet.to_bytes();

        assert_eq!(&bytes[..HEADER_SIZE], &[0, 0, 0, 1, 0, 0, 0, 4]);
        assert_eq!(&bytes[HEADER_SIZE..], b"xyz");
        assert_eq!(bytes.len(), packet.wire_len());
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_short_datagram_is_malformed() {
        let err = Packet::from_bytes(&[0, 0, 0, 1, 0]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { len: 5 }));
    }

    #[test]
    fn test_header_only_packet() {
        let packet = Packet::from_bytes(&[0, 0, 0, 2, 0, 0, 0, 3]).unwrap();
        assert_eq!(packet.seq, 2);
        assert_eq!(packet.total, 3);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_control_text() {
        assert_eq!(ControlMessage::Ready.to_bytes(), Bytes::from_static(b"READY"));
        assert_eq!(ControlMessage::Ack(42).to_bytes(), Bytes::from_static(b"ACK:42"));
        assert_eq!(ControlMessage::from_bytes(b"ACK:0").unwrap(), ControlMessage::Ack(0));
        assert_eq!(ControlMessage::from_bytes(b"READY").unwrap(), ControlMessage::Ready);
    }

    #[test]
    fn test_control_rejects_garbage() {
        for raw in [&b"ACK:"[..], b"ACK:-1", b"ACK:x", b"HELLO", b"\xff\xfe"] {
            assert!(matches!(
                ControlMessage::from_bytes(raw),
                Err(Error::InvalidControlMessage(_))
            ));
        }
    }
}
