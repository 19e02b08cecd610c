//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_MAX_PAYLOAD, DEFAULT_WINDOW_SIZE, HEADER_SIZE, MAX_DATAGRAM_SIZE};

/// GBN 전송 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 윈도우 크기 (ACK 없이 보낼 수 있는 최대 패킷 수)
    pub window_size: u32,

    /// 프래그먼트 최대 페이로드 (바이트)
    /// 헤더 포함 데이터그램이 MAX_DATAGRAM_SIZE를 넘으면 안 됨
    pub max_payload: usize,

    /// READY 대기 타임아웃 (밀리초)
    pub handshake_timeout_ms: u64,

    /// ACK 대기 타임아웃 (밀리초)
    /// 만료되면 윈도우 전체 재전송
    pub ack_timeout_ms: u64,

    /// 수신측 패킷 대기 타임아웃 (밀리초)
    pub recv_timeout_ms: u64,

    /// 진전 없는 연속 타임아웃 허용 횟수
    /// None이면 무제한 재시도
    pub max_retransmissions: Option<u32>,

    /// 수신 버퍼 크기
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD, // 6500 - 8
            handshake_timeout_ms: 10_000,     // 10초
            ack_timeout_ms: 500,              // 500ms
            recv_timeout_ms: 30_000,          // 30초
            max_retransmissions: None,        // 무제한
            recv_buffer_size: 65535,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 손실이 많은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            window_size: 4,
            max_payload: 1400,
            handshake_timeout_ms: 15_000,
            ack_timeout_ms: 250,
            recv_timeout_ms: 30_000,
            max_retransmissions: Some(50),
            recv_buffer_size: 65535,
        }
    }

    /// 루프백 테스트용 설정 (짧은 타이머)
    pub fn local_test() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
            handshake_timeout_ms: 2_000,
            ack_timeout_ms: 50,
            recv_timeout_ms: 3_000,
            max_retransmissions: Some(40),
            recv_buffer_size: 65535,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        if self.max_payload == 0 {
            return Err(Error::InvalidConfig("max_payload는 1 이상이어야 함".into()));
        }
        if self.max_payload + HEADER_SIZE > MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_payload {} + 헤더 {} > 데이터그램 한도 {}",
                self.max_payload, HEADER_SIZE, MAX_DATAGRAM_SIZE
            )));
        }
        if self.handshake_timeout_ms == 0 || self.ack_timeout_ms == 0 || self.recv_timeout_ms == 0 {
            return Err(Error::InvalidConfig("타임아웃은 0일 수 없음".into()));
        }
        if self.recv_buffer_size < MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "recv_buffer_size {}는 데이터그램 한도 {}보다 작음",
                self.recv_buffer_size, MAX_DATAGRAM_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_wire_limit() {
        let config = Config::default();
        assert_eq!(config.max_payload + HEADER_SIZE, MAX_DATAGRAM_SIZE);
        assert_eq!(config.window_size, 10);
        assert!(config.max_retransmissions.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(Config::lossy_network().validate().is_ok());
        assert!(Config::local_test().validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let config = Config {
            max_payload: MAX_DATAGRAM_SIZE,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
