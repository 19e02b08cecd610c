//! 에러 타입 정의

use thiserror::Error;

/// GBN 전송 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("핸드쉐이크 타임아웃: {waited_ms}ms 동안 READY 없음")]
    HandshakeTimeout { waited_ms: u64 },

    #[error(
        "전송 타임아웃: {received}/{} 프래그먼트 수신 ({partial_bytes} bytes)",
        display_total(.total)
    )]
    TransferTimeout {
        received: u32,
        total: Option<u32>,
        partial_bytes: usize,
    },

    #[error("잘못된 패킷: 길이 {len} bytes (헤더 8 bytes 미만)")]
    MalformedPacket { len: usize },

    #[error("알 수 없는 컨트롤 메시지: {0:?}")]
    InvalidControlMessage(String),

    #[error("재전송 한도 초과: base={base}, 연속 타임아웃 {attempts}회")]
    RetransmissionLimitExceeded { base: u32, attempts: u32 },

    #[error("전송 취소: {completed}/{} 프래그먼트 완료", display_total(.total))]
    Cancelled { completed: u32, total: Option<u32> },

    #[error("빈 데이터는 전송할 수 없음")]
    EmptyPayload,

    #[error("유효하지 않은 청크 크기: {chunk_size}")]
    InvalidChunkSize { chunk_size: usize },

    #[error("프래그먼트 수 초과: {count}개는 u32 헤더에 담을 수 없음")]
    TooManyFragments { count: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),
}

/// 총 프래그먼트 수는 첫 패킷 전까지 알 수 없음
fn display_total(total: &Option<u32>) -> String {
    match total {
        Some(total) => total.to_string(),
        None => "?".to_string(),
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
