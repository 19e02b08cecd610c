//! UDP 링크
//!
//! 소켓 + (선택) 장애 시뮬레이터. 수신은 항상 타임아웃으로 제한됨

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::simulator::Simulator;
use crate::Result;

/// 데이터그램 링크
pub struct Link {
    socket: UdpSocket,
    simulator: Option<Simulator>,
    buf: Vec<u8>,
}

impl Link {
    /// 로컬 주소에 바인딩
    pub async fn bind(addr: SocketAddr, recv_buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, recv_buffer_size))
    }

    /// 이미 바인딩된 소켓 사용
    pub fn from_socket(socket: UdpSocket, recv_buffer_size: usize) -> Self {
        Self {
            socket,
            simulator: None,
            buf: vec![0u8; recv_buffer_size],
        }
    }

    /// 송신 경로에 시뮬레이터 장착
    pub fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn simulator(&self) -> Option<&Simulator> {
        self.simulator.as_ref()
    }

    /// 데이터그램 송신
    ///
    /// 시뮬레이터가 폐기해도 송신한 것으로 취급 (손실은 보이지 않음)
    pub async fn send_to(&mut self, datagram: Bytes, addr: SocketAddr) -> Result<()> {
        let outgoing = match self.simulator.as_mut() {
            Some(sim) => sim.outgoing(datagram),
            None => vec![datagram],
        };

        for datagram in outgoing {
            self.socket.send_to(&datagram, addr).await?;
        }

        Ok(())
    }

    /// 데이터그램 수신 (타임아웃 시 None)
    pub async fn recv_from(&mut self, timeout: Duration) -> Result<Option<(Bytes, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((len, addr))) => Ok(Some((Bytes::copy_from_slice(&self.buf[..len]), addr))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!("수신 타임아웃: {:?}", timeout);
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("socket", &self.socket)
            .field("simulator", &self.simulator)
            .field("recv_buffer_size", &self.buf.len())
            .finish()
    }
}
