//! GBN 송신자 - Go-Back-N ARQ 파일 전송
//!
//! 수신자의 READY를 기다린 뒤 파일을 프래그먼트로 나눠 GBN으로 전송
//!
//! 사용법:
//!   cargo run --release --bin gbn-sender -- [OPTIONS]
//!
//! 예시:
//!   # 기본 전송
//!   cargo run --release --bin gbn-sender -- --bind 0.0.0.0:1234 --file song.mp3
//!
//!   # 10% 손실 시뮬레이션 + 재전송 한도
//!   cargo run --release --bin gbn-sender -- -f song.mp3 --loss 0.1 --max-retries 50

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gbn::{Config, Link, Sender, Simulator};

/// 송신자 실행 설정
struct SenderOptions {
    bind_addr: SocketAddr,
    file_path: Option<PathBuf>,
    loss_rate: f64,
    seed: u64,
    config: Config,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            file_path: None,
            loss_rate: 0.0,
            seed: 0,
            config: Config::default(),
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, Box<dyn Error>> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 옵션에 값이 필요함", flag).into())
}

fn parse_args() -> Result<Option<SenderOptions>, Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = SenderOptions::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--bind" | "-b" => {
                options.bind_addr = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--file" | "-f" => {
                options.file_path = Some(PathBuf::from(value(&args, i, flag)?));
                i += 1;
            }
            "--window" | "-w" => {
                options.config.window_size = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--payload" => {
                options.config.max_payload = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--ack-timeout" => {
                options.config.ack_timeout_ms = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--handshake-timeout" => {
                options.config.handshake_timeout_ms = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--max-retries" => {
                options.config.max_retransmissions = Some(value(&args, i, flag)?.parse()?);
                i += 1;
            }
            "--loss" => {
                options.loss_rate = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--seed" => {
                options.seed = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN Sender - Go-Back-N ARQ 파일 송신자

수신자의 READY를 기다린 뒤 슬라이딩 윈도우로 전송
- 누적 ACK로 윈도우 전진
- 타임아웃 시 윈도우 전체 재전송

사용법:
  cargo run --release --bin gbn-sender -- [OPTIONS]

옵션:
  -b, --bind <ADDR>            바인드 주소 (기본: 0.0.0.0:1234)
  -f, --file <PATH>            전송할 파일 경로 (없으면 25,000 bytes 테스트 데이터)
  -w, --window <N>             윈도우 크기 (기본: 10)
  --payload <BYTES>            프래그먼트 크기 (기본: 6492)
  --ack-timeout <MS>           ACK 타임아웃 (기본: 500)
  --handshake-timeout <MS>     READY 대기 타임아웃 (기본: 10000)
  --max-retries <N>            연속 타임아웃 한도 (기본: 무제한)
  --loss <RATE>                송신 손실 시뮬레이션 0.0~1.0 (기본: 0)
  --seed <N>                   손실 시뮬레이션 시드 (기본: 0)
  -h, --help                   이 도움말 출력
"#
                );
                return Ok(None);
            }
            other => {
                warn!("알 수 없는 옵션 무시: {}", other);
            }
        }
        i += 1;
    }

    Ok(Some(options))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(options) = parse_args()? else {
        return Ok(());
    };
    options.config.validate()?;

    info!("GBN Sender starting...");
    info!("Bind address: {}", options.bind_addr);
    info!("Window size: {}", options.config.window_size);
    info!("Max payload: {} bytes", options.config.max_payload);

    // 전송할 데이터 준비
    let data = match &options.file_path {
        Some(path) => {
            info!("Loading file: {:?}", path);
            Bytes::from(tokio::fs::read(path).await?)
        }
        None => {
            info!("Using test data (25,000 bytes)");
            Bytes::from((0..25_000u32).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
        }
    };
    info!("Data size: {} bytes", data.len());

    let mut link = Link::bind(options.bind_addr, options.config.recv_buffer_size).await?;
    if options.loss_rate > 0.0 {
        info!("Simulated loss: {:.1}% (seed {})", options.loss_rate * 100.0, options.seed);
        link = link.with_simulator(Simulator::with_loss(options.loss_rate, options.seed));
    }

    let sender = Sender::from_link(options.config, link)?;

    // Ctrl-C → 전송 취소
    let handle = sender.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    let report = sender.send(data).await?;

    info!("Transfer finished!");
    info!("  Fragments: {}", report.fragments);
    info!("  Bytes: {}", report.bytes);
    info!("  Time: {:.2}s", report.elapsed.as_secs_f64());
    info!("  Packets sent: {}", report.stats.packets_sent);
    info!("  Retransmissions: {}", report.retransmissions);

    Ok(())
}
