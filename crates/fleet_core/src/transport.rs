//! Transporte por datagramas, sem confirmação.
//!
//! Abrir o transporte é o único ponto fatal: sem socket o agente não entra
//! no loop. Envios são fire-and-forget e uma perda só aparece como
//! [`Delivery::Dropped`].

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Maior datagrama de entrada lido por vez.
const INBOUND_BUFFER: usize = 2048;

/// Erros de transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Nenhum transporte UDP disponível em {bind}: {source}")]
    Unavailable {
        bind: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Endpoint inválido: {0}")]
    InvalidEndpoint(String),
}

/// Resultado de um envio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(usize),
    Dropped,
}

/// Datagrama recebido do coletor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub from: SocketAddr,
    pub data: Vec<u8>,
}

/// Canal de saída de um agente.
pub trait Transport: Send {
    /// Envia um frame ao coletor. Nunca bloqueia nem repete.
    fn send(&mut self, frame: &[u8]) -> Delivery;

    /// Lê, sem bloquear, tudo que chegou desde a última chamada.
    fn drain_inbound(&mut self) -> Vec<Inbound> {
        Vec::new()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Fábrica de transportes.
pub trait Connector {
    type Link: Transport + 'static;

    fn open(&self, local_port: u16, collector: SocketAddr) -> Result<Self::Link, TransportError>;
}

// ──────────────────────────────────────────────
// UDP
// ──────────────────────────────────────────────

/// Abre sockets UDP; sem `bind_ip` usa o endereço não especificado da
/// mesma família do coletor.
#[derive(Debug, Clone, Default)]
pub struct UdpConnector {
    bind_ip: Option<IpAddr>,
}

impl UdpConnector {
    pub fn new(bind_ip: Option<IpAddr>) -> Self {
        Self { bind_ip }
    }

    fn bind_addr(&self, local_port: u16, collector: SocketAddr) -> SocketAddr {
        let ip = self.bind_ip.unwrap_or(match collector {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        });
        SocketAddr::new(ip, local_port)
    }
}

impl Connector for UdpConnector {
    type Link = UdpLink;

    fn open(&self, local_port: u16, collector: SocketAddr) -> Result<UdpLink, TransportError> {
        let bind = self.bind_addr(local_port, collector);
        let socket = UdpSocket::bind(bind)
            .and_then(|sock| sock.set_nonblocking(true).map(|_| sock))
            .map_err(|source| TransportError::Unavailable { bind, source })?;

        Ok(UdpLink { socket, collector })
    }
}

/// Socket UDP de um agente, endereçado a um coletor fixo.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    collector: SocketAddr,
}

impl Transport for UdpLink {
    fn send(&mut self, frame: &[u8]) -> Delivery {
        match self.socket.send_to(frame, self.collector) {
            Ok(sent) => Delivery::Sent(sent),
            Err(e) => {
                debug!("Datagrama descartado para {}: {e}", self.collector);
                Delivery::Dropped
            }
        }
    }

    fn drain_inbound(&mut self) -> Vec<Inbound> {
        let mut received = Vec::new();
        let mut buf = [0u8; INBOUND_BUFFER];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((size, from)) => received.push(Inbound {
                    from,
                    data: buf[..size].to_vec(),
                }),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    // ICMP port unreachable aparece aqui em algumas plataformas
                    debug!("Erro ao receber UDP: {e}");
                    break;
                }
            }
        }
        received
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

/// Resolve `host` (IP literal, com ou sem colchetes, ou nome) e porta.
pub fn resolve_endpoint(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let bare = host.trim().trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (bare, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| TransportError::InvalidEndpoint(format!("{host}:{port}")))
}

// ──────────────────────────────────────────────
// Dublês de teste
// ──────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn udp_loopback_delivery() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        collector
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let collector_addr = collector.local_addr().unwrap();

        let connector = UdpConnector::new(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        let mut link = connector.open(0, collector_addr).unwrap();

        assert_eq!(link.send(b"{\"motion\":1}"), Delivery::Sent(12));

        let mut buf = [0u8; 64];
        let (size, from) = collector.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..size], b"{\"motion\":1}");
        assert_eq!(Some(from), link.local_addr());
    }

    #[test]
    fn inbound_is_drained_without_blocking() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        let connector = UdpConnector::new(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        let mut link = connector.open(0, collector.local_addr().unwrap()).unwrap();

        assert!(link.drain_inbound().is_empty());

        let agent_addr = link.local_addr().unwrap();
        collector.send_to(b"ack", agent_addr).unwrap();

        // Dá tempo do datagrama chegar no loopback
        let mut inbound = Vec::new();
        for _ in 0..50 {
            inbound = link.drain_inbound();
            if !inbound.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].data, b"ack");
    }

    #[test]
    fn port_in_use_is_unavailable() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let connector = UdpConnector::new(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

        let result = connector.open(port, "127.0.0.1:9".parse().unwrap());
        assert!(matches!(result, Err(TransportError::Unavailable { .. })));
    }

    #[test]
    fn bind_follows_collector_family() {
        let connector = UdpConnector::default();
        let v6 = connector.bind_addr(5555, "[aaaa::1]:8849".parse().unwrap());
        let v4 = connector.bind_addr(5555, "10.0.0.1:8849".parse().unwrap());
        assert_eq!(v6, "[::]:5555".parse().unwrap());
        assert_eq!(v4, "0.0.0.0:5555".parse().unwrap());
    }

    #[test]
    fn resolves_literal_endpoints() {
        assert_eq!(
            resolve_endpoint("[fe80::1]", 1234).unwrap(),
            "[fe80::1]:1234".parse().unwrap()
        );
        assert_eq!(
            resolve_endpoint("aaaa::1", 8849).unwrap(),
            "[aaaa::1]:8849".parse().unwrap()
        );
        assert_eq!(
            resolve_endpoint("127.0.0.1", 1).unwrap(),
            "127.0.0.1:1".parse().unwrap()
        );
        assert!(matches!(
            resolve_endpoint("", 1),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
