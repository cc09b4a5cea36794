use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Data that came from (or is headed to) a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// A CoAP network socket
///
/// This mirrors the Udp socket traits in embedded-nal, but allows us to
/// implement them for foreign types (like `std::net::UdpSocket`).
///
/// Every operation is non-blocking: "nothing to do right now" is
/// reported as [`nb::Error::WouldBlock`].
pub trait Socket: Sized {
  /// The error yielded by socket operations
  type Error: core::fmt::Debug;

  /// Get the local address this socket is bound to
  fn local_addr(&self) -> SocketAddr;

  /// Bind the socket to an address, yielding a socket in non-blocking mode.
  ///
  /// Binds to the first address if `addr` yields multiple addresses.
  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error>;

  /// Send a datagram to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull a buffered datagram from the socket, along with the address of the sender.
  ///
  /// It is expected that (like [`std::net::UdpSocket`]) if the datagram is larger
  /// than the buffer, those bytes are dropped and not considered an error condition.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Poll the socket for one datagram, copying it out of `buffer`
  fn poll(&self, buffer: &mut [u8]) -> Result<Option<Addrd<Vec<u8>>>, Self::Error> {
    match self.recv(buffer) {
      | Ok(Addrd(n, addr)) => Ok(Some(Addrd(buffer[..n.min(buffer.len())].to_vec(), addr))),
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }

  /// Join a multicast group
  fn join_multicast(&self, addr: IpAddr) -> Result<(), Self::Error>;

  /// Leave a multicast group
  fn leave_multicast(&self, addr: IpAddr) -> Result<(), Self::Error>;
}

/// Host name resolution
///
/// Resolution may take several calls to complete: implementors
/// return [`nb::Error::WouldBlock`] until the lookup has finished.
pub trait Resolve {
  /// The error yielded when a lookup fails
  type Error: core::fmt::Debug;

  /// Resolve `host` to the addresses it is reachable at.
  ///
  /// An empty list is treated the same as an error.
  fn resolve(&mut self, host: &str, port: u16) -> nb::Result<Vec<IpAddr>, Self::Error>;
}
