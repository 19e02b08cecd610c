//! 프래그먼트 분할과 재조립
//!
//! - Fragment: 파일을 고정 최대 크기로 자른 조각 (패킷 하나의 페이로드)
//! - Reassembly: 시퀀스 순서로 쌓이는 수신 버퍼

use bytes::{Bytes, BytesMut};

use crate::{Error, Result};

/// 프래그먼트 (불변 바이트 조각 + 0부터 시작하는 시퀀스 번호)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 시퀀스 번호
    pub seq: u32,

    /// 실제 데이터
    pub data: Bytes,
}

impl Fragment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 데이터를 프래그먼트로 분할
///
/// i번째 프래그먼트는 `[i * chunk_size, min((i + 1) * chunk_size, len))` 구간.
/// `Bytes::slice`로 자르므로 복사 없음
pub fn fragment(data: &Bytes, chunk_size: usize) -> Result<Vec<Fragment>> {
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize { chunk_size });
    }
    if data.is_empty() {
        return Err(Error::EmptyPayload);
    }

    let count = (data.len() + chunk_size - 1) / chunk_size;
    if count > u32::MAX as usize {
        return Err(Error::TooManyFragments { count });
    }

    Ok((0..count)
        .map(|idx| {
            let start = idx * chunk_size;
            let end = (start + chunk_size).min(data.len());
            Fragment {
                seq: idx as u32,
                data: data.slice(start..end),
            }
        })
        .collect())
}

/// 미리 확보하는 최대 슬롯 수 (헤더의 total은 검증되지 않은 값)
const PREALLOC_SLOTS: usize = 1024;

/// 수신 버퍼 (시퀀스 순서로 쌓이는 프래그먼트)
///
/// `slots[i]`는 시퀀스 `i`의 데이터. 순서대로만 채워지므로
/// 중간에 빈 칸이 생기지 않음
#[derive(Debug)]
pub struct Reassembly {
    slots: Vec<Bytes>,
    total: u32,
    bytes: usize,
}

impl Reassembly {
    /// 총 프래그먼트 수 지정 (공간은 받는 만큼만 늘어남)
    pub fn with_total(total: u32) -> Self {
        Self {
            slots: Vec::with_capacity((total as usize).min(PREALLOC_SLOTS)),
            total,
            bytes: 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// 채워진 연속 슬롯 수
    pub fn filled(&self) -> u32 {
        self.slots.len() as u32
    }

    /// 지금까지 저장된 바이트 수
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// 다음 슬롯에 저장
    ///
    /// `seq`가 다음 빈 슬롯이 아니면 저장하지 않고 false 반환
    pub fn push(&mut self, seq: u32, data: Bytes) -> bool {
        if seq != self.filled() || seq >= self.total {
            return false;
        }
        self.bytes += data.len();
        self.slots.push(data);
        true
    }

    /// 모든 슬롯이 채워졌는지
    pub fn is_complete(&self) -> bool {
        self.filled() == self.total
    }

    /// 시퀀스 순서대로 이어붙여 원본 복원
    ///
    /// 완료되지 않았으면 None (부분 파일은 결과로 취급하지 않음)
    pub fn into_bytes(self) -> Option<Bytes> {
        if !self.is_complete() {
            return None;
        }

        let mut buf = BytesMut::with_capacity(self.bytes);
        for slot in &self.slots {
            buf.extend_from_slice(slot);
        }
        Some(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_boundaries() {
        let data: Bytes = (0..250u32).map(|i| i as u8).collect::<Vec<_>>().into();
        let fragments = fragment(&data, 100).unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].seq, 0);
        assert_eq!(fragments[2].seq, 2);
        assert_eq!(fragments[0].data, data.slice(0..100));
        assert_eq!(fragments[1].data, data.slice(100..200));
        assert_eq!(fragments[2].len(), 50);
    }

    #[test]
    fn test_fragment_exact_multiple() {
        let data = Bytes::from(vec![7u8; 300]);
        let fragments = fragment(&data, 100).unwrap();
        assert_eq!(fragments.len(), 3);
        assert!(fragments.iter().all(|f| f.len() == 100));
    }

    #[test]
    fn test_fragment_audio_sized_payload() {
        let data = Bytes::from(vec![1u8; 25_000]);
        let fragments = fragment(&data, 6492).unwrap();

        let sizes: Vec<usize> = fragments.iter().map(Fragment::len).collect();
        assert_eq!(sizes, vec![6492, 6492, 6492, 5524]);
    }

    #[test]
    fn test_fragment_rejects_bad_input() {
        assert!(matches!(fragment(&Bytes::new(), 10), Err(Error::EmptyPayload)));
        assert!(matches!(
            fragment(&Bytes::from_static(b"abc"), 0),
            Err(Error::InvalidChunkSize { chunk_size: 0 })
        ));
    }

    #[test]
    fn test_reassembly_in_order_only() {
        let mut buf = Reassembly::with_total(3);

        assert!(!buf.push(1, Bytes::from_static(b"bb")));
        assert!(buf.push(0, Bytes::from_static(b"aa")));
        assert!(!buf.push(0, Bytes::from_static(b"xx")));
        assert!(buf.push(1, Bytes::from_static(b"bb")));
        assert!(!buf.is_complete());
        assert!(buf.push(2, Bytes::from_static(b"c")));
        assert!(!buf.push(3, Bytes::from_static(b"d")));

        assert_eq!(buf.bytes(), 5);
        assert_eq!(buf.into_bytes().unwrap(), Bytes::from_static(b"aabbc"));
    }

    #[test]
    fn test_incomplete_reassembly_yields_nothing() {
        let mut buf = Reassembly::with_total(2);
        buf.push(0, Bytes::from_static(b"half"));
        assert!(buf.into_bytes().is_none());
    }

    #[test]
    fn test_huge_total_allocates_lazily() {
        let mut buf = Reassembly::with_total(u32::MAX);
        assert!(buf.slots.capacity() <= PREALLOC_SLOTS);

        assert!(buf.push(0, Bytes::from_static(b"x")));
        assert_eq!(buf.filled(), 1);
        assert_eq!(buf.total(), u32::MAX);
        assert!(!buf.is_complete());
    }
}
