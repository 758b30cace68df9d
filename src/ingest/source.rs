//! Datagram sources for the ingestion loop

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use tracing::{debug, info, warn};

/// Non-blocking source of raw datagrams
pub trait DatagramSource {
    /// Copy the next datagram into `buf` and return its length.
    ///
    /// `Ok(None)` means nothing is pending right now.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

/// Foreign datagrams dropped per `receive` call before yielding
const FOREIGN_BURST: usize = 64;

/// UDP listener in non-blocking mode
///
/// With a module address set, datagrams from any other host are discarded.
#[derive(Debug)]
pub struct UdpDatagramSource {
    socket: UdpSocket,
    module_ip: Option<IpAddr>,
    foreign_dropped: u64,
}

impl UdpDatagramSource {
    /// Bind a non-blocking UDP socket on `addr`
    pub fn bind(addr: SocketAddr, module_ip: Option<IpAddr>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        info!(
            local_addr = %socket.local_addr()?,
            module_ip = ?module_ip,
            "UDP listener bound"
        );

        Ok(Self {
            socket,
            module_ip,
            foreign_dropped: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Datagrams discarded because they came from another host
    pub fn foreign_dropped(&self) -> u64 {
        self.foreign_dropped
    }

    fn is_foreign(&self, from: &SocketAddr) -> bool {
        matches!(self.module_ip, Some(ip) if ip != from.ip())
    }
}

impl DatagramSource for UdpDatagramSource {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        for _ in 0..FOREIGN_BURST {
            match self.socket.recv_from(buf) {
                Ok((len, from)) if self.is_foreign(&from) => {
                    if self.foreign_dropped == 0 {
                        warn!(%from, "Dropping datagrams from host other than the module");
                    }
                    self.foreign_dropped += 1;
                    debug!(%from, len, "Dropped foreign datagram");
                }
                Ok((len, _)) => return Ok(Some(len)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

/// In-memory source that replays queued datagrams, then reports empty
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    datagrams: VecDeque<Vec<u8>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, datagram: impl Into<Vec<u8>>) {
        self.datagrams.push_back(datagram.into());
    }

    pub fn len(&self) -> usize {
        self.datagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }
}

impl<T: Into<Vec<u8>>> FromIterator<T> for ReplaySource {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            datagrams: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl DatagramSource for ReplaySource {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let Some(datagram) = self.datagrams.pop_front() else {
            return Ok(None);
        };
        // Same truncation a socket applies to an undersized buffer
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_source_order_and_empty() {
        let mut source: ReplaySource = [vec![1u8, 2], vec![3u8]].into_iter().collect();
        let mut buf = [0u8; 16];

        assert_eq!(source.receive(&mut buf).unwrap(), Some(2));
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(source.receive(&mut buf).unwrap(), Some(1));
        assert_eq!(buf[0], 3);
        assert_eq!(source.receive(&mut buf).unwrap(), None);
        assert!(source.is_empty());
    }

    #[test]
    fn test_replay_source_truncates_to_buffer() {
        let mut source = ReplaySource::new();
        source.push(vec![7u8; 100]);
        let mut buf = [0u8; 10];
        assert_eq!(source.receive(&mut buf).unwrap(), Some(10));
    }

    #[test]
    fn test_udp_source_would_block_is_none() {
        let mut source = UdpDatagramSource::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(source.receive(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_udp_source_receives_loopback() {
        let mut source = UdpDatagramSource::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let target = source.local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[9u8; 58], target).unwrap();

        let mut buf = [0u8; 1500];
        let mut received = None;
        for _ in 0..1000 {
            if let Some(len) = source.receive(&mut buf).unwrap() {
                received = Some(len);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(received, Some(58));
    }

    #[test]
    fn test_udp_source_drops_foreign_hosts() {
        // Only accept traffic from an address the sender cannot have
        let module_ip: IpAddr = "192.0.2.1".parse().unwrap();
        let mut source =
            UdpDatagramSource::bind("127.0.0.1:0".parse().unwrap(), Some(module_ip)).unwrap();
        let target = source.local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[1u8; 58], target).unwrap();

        let mut buf = [0u8; 1500];
        for _ in 0..1000 {
            assert_eq!(source.receive(&mut buf).unwrap(), None);
            if source.foreign_dropped() == 1 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(source.foreign_dropped(), 1);
    }
}
