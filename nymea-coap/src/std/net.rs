use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::net::{Addrd, Socket};

impl Socket for UdpSocket {
  type Error = io::Error;

  fn local_addr(&self) -> SocketAddr {
    UdpSocket::local_addr(self).unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
  }

  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let sock = UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), msg.addr())
        .map(|_| ())
        .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    self.recv_from(buffer)
        .map(|(n, addr)| Addrd(n, addr))
        .map_err(|e| match e.kind() {
          // an ICMP "port unreachable" for something we sent earlier
          | io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            log::debug!("{}", e);
            nb::Error::WouldBlock
          },
          | _ => io_to_nb(e),
        })
  }

  fn join_multicast(&self, addr: IpAddr) -> Result<(), Self::Error> {
    match addr {
      | IpAddr::V4(addr) => self.join_multicast_v4(&addr, &Ipv4Addr::UNSPECIFIED),
      | IpAddr::V6(addr) => self.join_multicast_v6(&addr, 0),
    }
  }

  fn leave_multicast(&self, addr: IpAddr) -> Result<(), Self::Error> {
    match addr {
      | IpAddr::V4(addr) => self.leave_multicast_v4(&addr, &Ipv4Addr::UNSPECIFIED),
      | IpAddr::V6(addr) => self.leave_multicast_v6(&addr, 0),
    }
  }
}

/// Convert an [`io::Error`] into an [`nb::Error`],
/// mapping [`io::ErrorKind::WouldBlock`] to [`nb::Error::WouldBlock`].
pub fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}
