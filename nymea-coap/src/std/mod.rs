use std::io;
use std::net::{IpAddr, ToSocketAddrs, UdpSocket};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use embedded_time::rate::Fraction;

use crate::config::Config;
use crate::coap::Coap;
use crate::net::{Resolve, Socket};
use crate::platform::Std;

/// `Socket` for `std::net::UdpSocket`
pub mod net;
pub use net::*;

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let elapsed = std::time::Instant::now().duration_since(self.0);
    let micros = u64::try_from(elapsed.as_micros()).map_err(|_| embedded_time::clock::Error::Unspecified)?;
    Ok(embedded_time::Instant::new(micros))
  }
}

/// Resolves host names with the operating system's resolver.
///
/// `getaddrinfo` blocks, so each lookup runs on its own thread and
/// [`Resolve::resolve`] answers [`nb::Error::WouldBlock`] until the
/// thread reports back. IP literals are answered at once.
/// IPv4 addresses are listed before IPv6 ones.
#[derive(Debug, Default)]
pub struct Dns {
  pending: Option<Lookup>,
}

#[derive(Debug)]
struct Lookup {
  host: String,
  port: u16,
  result: Receiver<io::Result<Vec<IpAddr>>>,
}

impl Dns {
  fn start(host: &str, port: u16) -> Lookup {
    let (tx, rx) = mpsc::channel();
    let owned = host.to_string();

    thread::spawn(move || {
      let ips = (owned.as_str(), port).to_socket_addrs()
                                      .map(|addrs| addrs.map(|addr| addr.ip()).collect());
      // the receiver is gone if the lookup was abandoned
      tx.send(ips).ok();
    });

    log::debug!("looking up {}", host);
    Lookup { host: host.to_string(),
             port,
             result: rx }
  }
}

impl Resolve for Dns {
  type Error = io::Error;

  fn resolve(&mut self, host: &str, port: u16) -> nb::Result<Vec<IpAddr>, io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
      return Ok(vec![ip]);
    }

    let lookup = match self.pending.take() {
      | Some(lookup) if lookup.host == host && lookup.port == port => lookup,
      | _ => Self::start(host, port),
    };

    match lookup.result.try_recv() {
      | Ok(Ok(mut ips)) => {
        ips.sort_by_key(IpAddr::is_ipv6);
        ips.dedup();
        Ok(ips)
      },
      | Ok(Err(e)) => Err(nb::Error::Other(e)),
      | Err(TryRecvError::Empty) => {
        self.pending = Some(lookup);
        Err(nb::Error::WouldBlock)
      },
      | Err(TryRecvError::Disconnected) => {
        Err(nb::Error::Other(io::Error::new(io::ErrorKind::Other, "resolver thread died")))
      },
    }
  }
}

impl Coap<Std> {
  /// Create a client bound to `0.0.0.0:port` (`0` picks any free port)
  pub fn try_new_std(port: u16) -> io::Result<Self> {
    Self::try_new_std_config(port, Config::default())
  }

  /// Create a client bound to `0.0.0.0:port` with a specific config
  pub fn try_new_std_config(port: u16, config: Config) -> io::Result<Self> {
    let sock = <UdpSocket as Socket>::bind_raw(("0.0.0.0", port))?;
    log::debug!("bound to {}", Socket::local_addr(&sock));

    Ok(Coap::new_config(config, sock, Clock::new(), Dns::default()))
  }
}
