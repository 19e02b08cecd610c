//! GBN 수신자 - Go-Back-N ARQ 파일 수신
//!
//! READY를 보낸 뒤 순서대로 도착한 프래그먼트만 저장하고 누적 ACK 전송
//!
//! 사용법:
//!   cargo run --release --bin gbn-receiver -- [OPTIONS]
//!
//! 예시:
//!   # 기본 수신
//!   cargo run --release --bin gbn-receiver -- --sender 127.0.0.1:1234 --output received.mp3
//!
//!   # ACK 손실 시뮬레이션
//!   cargo run --release --bin gbn-receiver -- -s 127.0.0.1:1234 -o out.mp3 --loss 0.1

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gbn::{Config, Link, Receiver, Simulator};

/// 수신자 실행 설정
struct ReceiverOptions {
    bind_addr: SocketAddr,
    sender_addr: SocketAddr,
    output_path: PathBuf,
    loss_rate: f64,
    seed: u64,
    config: Config,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5678)),
            sender_addr: SocketAddr::from(([127, 0, 0, 1], 1234)),
            output_path: PathBuf::from("received.bin"),
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

fn parse_args() -> Result<Option<ReceiverOptions>, Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = ReceiverOptions::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--bind" | "-b" => {
                options.bind_addr = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--sender" | "-s" => {
                options.sender_addr = value(&args, i, flag)?.parse()?;
                i += 1;
            }
            "--output" | "-o" => {
                options.output_path = PathBuf::from(value(&args, i, flag)?);
                i += 1;
            }
            "--recv-timeout" => {
                options.config.recv_timeout_ms = value(&args, i, flag)?.parse()?;
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
                    r#"GBN Receiver - Go-Back-N ARQ 파일 수신자

READY 전송 후 순서대로 도착한 프래그먼트만 저장
- 중복/순서 어긋난 패킷은 폐기 후 누적 ACK 재전송
- 전부 받은 경우에만 파일 저장

사용법:
  cargo run --release --bin gbn-receiver -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        로컬 바인드 주소 (기본: 0.0.0.0:5678)
  -s, --sender <ADDR>      송신자 주소 (기본: 127.0.0.1:1234)
  -o, --output <PATH>      저장 경로 (기본: received.bin)
  --recv-timeout <MS>      패킷 대기 타임아웃 (기본: 30000)
  --loss <RATE>            ACK 손실 시뮬레이션 0.0~1.0 (기본: 0)
  --seed <N>               손실 시뮬레이션 시드 (기본: 0)
  -h, --help               이 도움말 출력
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

    info!("GBN Receiver starting...");
    info!("Sender address: {}", options.sender_addr);
    info!("Bind address: {}", options.bind_addr);

    let mut link = Link::bind(options.bind_addr, options.config.recv_buffer_size).await?;
    if options.loss_rate > 0.0 {
        info!("Simulated loss: {:.1}% (seed {})", options.loss_rate * 100.0, options.seed);
        link = link.with_simulator(Simulator::with_loss(options.loss_rate, options.seed));
    }

    let receiver = Receiver::from_link(options.config, link, options.sender_addr)?;

    // Ctrl-C → 수신 취소
    let handle = receiver.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    let received = match receiver.receive().await {
        Ok(received) => received,
        Err(e) => {
            // 부분 파일은 저장하지 않음
            warn!("Incomplete transfer: {}", e);
            return Err(e.into());
        }
    };

    tokio::fs::write(&options.output_path, &received.data).await?;

    info!("Transfer complete!");
    info!("  Fragments: {}", received.report.fragments);
    info!("  Bytes: {}", received.data.len());
    info!("  Time: {:.2}s", received.report.elapsed.as_secs_f64());
    info!("  Packets received: {}", received.report.stats.packets_received);
    info!("  Duplicates: {}", received.report.stats.duplicate_packets);
    info!("  Out of order: {}", received.report.stats.out_of_order_packets);
    info!("Data saved to {:?}", options.output_path);

    Ok(())
}
