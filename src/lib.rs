//! # GBN (Go-Back-N) ARQ 파일 전송
//!
//! 손실/순서 뒤바뀜이 있는 UDP 위에서 신뢰성 있는 순서 보장 전송
//!
//! ## 핵심 특징
//! - **슬라이딩 윈도우**: 최대 `window_size`개 패킷을 ACK 없이 전송
//! - **누적 ACK**: `ACK:n` 하나로 0..=n 전체 확인
//! - **Go-Back-N 재전송**: 타임아웃 시 윈도우 전체 재전송
//! - **단순한 수신자**: 순서대로 도착한 패킷만 저장, 나머지는 폐기 후 재 ACK
//! - **바이트 단위 복원**: 시퀀스 순서로 이어붙여 원본과 동일한 파일 복원

pub mod config;
pub mod error;
pub mod fragment;
pub mod handle;
pub mod link;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use fragment::{fragment, Fragment, Reassembly};
pub use handle::TransferHandle;
pub use link::Link;
pub use packet::{ControlMessage, Packet};
pub use receiver::{GbnReceiver, ReceivedFile, Receiver};
pub use sender::{GbnWindow, Sender};
pub use simulator::Simulator;
pub use stats::{TransferReport, TransferStats};

/// 데이터 패킷 헤더 크기 (seq u32 + total u32, big-endian)
pub const HEADER_SIZE: usize = 8;

/// 데이터그램 최대 크기 (헤더 포함)
pub const MAX_DATAGRAM_SIZE: usize = 6500;

/// 기본 페이로드 크기 (바이트)
pub const DEFAULT_MAX_PAYLOAD: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;

/// 기본 윈도우 크기 (패킷 수)
pub const DEFAULT_WINDOW_SIZE: u32 = 10;

/// 수신 준비 완료 메시지
pub const READY: &str = "READY";

/// 누적 ACK 메시지 접두사
pub const ACK_PREFIX: &str = "ACK:";
