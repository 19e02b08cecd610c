//! 네트워크 장애 시뮬레이터
//!
//! 송신 경로에 끼워서 손실/순서 뒤바뀜을 재현한다.
//!
//! | 장애        | 설명                                                  |
//! |-------------|-------------------------------------------------------|
//! | 랜덤 손실   | `loss_rate` 확률로 폐기 (시드 고정 RNG)               |
//! | 지정 손실   | 조건에 맞는 데이터그램을 처음 `times`번 폐기          |
//! | 지연        | 조건에 맞는 데이터그램을 다음 전송 뒤로 미룸          |

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::{ControlMessage, Packet};

/// 데이터그램 매칭 조건
pub type Matcher = Box<dyn FnMut(&[u8]) -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Drop,
    HoldBack,
}

struct Rule {
    matcher: Matcher,
    action: Action,
    remaining: u32,
}

/// 장애 주입기
pub struct Simulator {
    loss_rate: f64,
    rng: StdRng,
    rules: Vec<Rule>,
    held: Option<Bytes>,

    /// 폐기한 데이터그램 수
    pub dropped: u64,

    /// 지연시킨 데이터그램 수
    pub held_back: u64,
}

impl Simulator {
    /// 장애 없는 시뮬레이터
    pub fn new(seed: u64) -> Self {
        Self {
            loss_rate: 0.0,
            rng: StdRng::seed_from_u64(seed),
            rules: Vec::new(),
            held: None,
            dropped: 0,
            held_back: 0,
        }
    }

    /// 랜덤 손실 시뮬레이터
    pub fn with_loss(loss_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            ..Self::new(seed)
        }
    }

    /// 조건에 맞는 데이터그램을 처음 `times`번 폐기
    pub fn drop_when<F>(mut self, times: u32, matcher: F) -> Self
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            action: Action::Drop,
            remaining: times,
        });
        self
    }

    /// 조건에 맞는 첫 데이터그램을 다음 데이터그램 뒤로 미룸
    pub fn hold_back_when<F>(mut self, matcher: F) -> Self
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            action: Action::HoldBack,
            remaining: 1,
        });
        self
    }

    /// 시퀀스 번호가 `seq`인 데이터 패킷
    pub fn data_seq(seq: u32) -> impl FnMut(&[u8]) -> bool + Send + 'static {
        move |datagram| {
            Packet::from_bytes(datagram)
                .map(|p| p.seq == seq)
                .unwrap_or(false)
        }
    }

    /// 특정 컨트롤 메시지
    pub fn control(msg: ControlMessage) -> impl FnMut(&[u8]) -> bool + Send + 'static {
        move |datagram| ControlMessage::from_bytes(datagram).ok() == Some(msg)
    }

    /// 송신할 데이터그램을 받아 실제로 내보낼 목록 반환 (순서대로)
    pub fn outgoing(&mut self, datagram: Bytes) -> Vec<Bytes> {
        let mut action = None;
        for rule in self.rules.iter_mut() {
            if rule.remaining > 0 && (rule.matcher)(&datagram) {
                rule.remaining -= 1;
                action = Some(rule.action);
                break;
            }
        }

        if action.is_none() && self.loss_rate > 0.0 && self.rng.gen_bool(self.loss_rate) {
            action = Some(Action::Drop);
        }

        match action {
            Some(Action::Drop) => {
                self.dropped += 1;
                Vec::new()
            }
            Some(Action::HoldBack) => {
                self.held_back += 1;
                // 이미 잡아둔 것이 있으면 먼저 내보냄
                self.held.replace(datagram).into_iter().collect()
            }
            None => {
                let mut out = vec![datagram];
                out.extend(self.held.take());
                out
            }
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("loss_rate", &self.loss_rate)
            .field("rules", &self.rules.len())
            .field("holding", &self.held.is_some())
            .field("dropped", &self.dropped)
            .field("held_back", &self.held_back)
            .finish()
    }
}
