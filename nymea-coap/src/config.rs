use std::net::Ipv4Addr;

use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};

/// Size exponent of every block this client sends or requests
/// (`2^(2 + 4)` = 64 bytes)
pub const BLOCK_SZX: u8 = 2;

/// Size in bytes of every block this client sends or requests
pub const BLOCK_SIZE: usize = 64;

/// Configuration options related to outbound CON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Con {
  /// Retry strategy for CON requests that
  /// have not yet been ACKed.
  ///
  /// Defaults to resending every 2 seconds:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use nymea_coap::config::Con;
  /// use nymea_coap::retry::Strategy;
  ///
  /// assert_eq!(Con::default().retry_strategy,
  ///            Strategy::Delay { min: Milliseconds(2_000),
  ///                              max: Milliseconds(2_000) });
  /// ```
  pub retry_strategy: Strategy,
  /// Number of times we are allowed to send a CON request
  /// (the first send included) before the reply times out.
  ///
  /// Defaults to 5 attempts, the original send plus 4 retransmissions.
  /// ```
  /// use nymea_coap::config::Con;
  /// use nymea_coap::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(5));
  /// ```
  pub max_attempts: Attempts,
}

/// Configuration options related to parsing & handling messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
  /// Seed mixed into every generated message [`Token`](nymea_coap_msg::Token),
  /// customizable to allow for your application to generate tokens
  /// less guessably.
  ///
  /// ```
  /// use nymea_coap::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_seed, 0);
  /// ```
  pub token_seed: u16,

  /// See [`Con`]
  pub con: Con,
}

impl Default for Con {
  fn default() -> Self {
    Con { retry_strategy: Strategy::Delay { min: Milliseconds(2_000),
                                            max: Milliseconds(2_000) },
          max_attempts: Attempts(5) }
  }
}

impl Default for Msg {
  fn default() -> Self {
    Msg { token_seed: 0,
          con: Con::default() }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// See [`Msg`]
  pub msg: Msg,
  /// Port assumed when a request URL does not name one.
  /// The Uri-Port option is only sent for other ports.
  ///
  /// ```
  /// use nymea_coap::config::Config;
  ///
  /// assert_eq!(Config::default().default_port, 5683);
  /// ```
  pub default_port: u16,
  /// Group joined by [`Coap::join_multicast_group`](crate::Coap::join_multicast_group)
  /// when no address is given.
  ///
  /// Defaults to "All CoAP Nodes":
  /// ```
  /// use std::net::Ipv4Addr;
  ///
  /// use nymea_coap::config::Config;
  ///
  /// assert_eq!(Config::default().multicast_group, Ipv4Addr::new(224, 0, 1, 187));
  /// ```
  pub multicast_group: Ipv4Addr,
  /// Size of the buffer datagrams are received into.
  /// Bytes beyond this length are dropped by the socket.
  ///
  /// ```
  /// use nymea_coap::config::Config;
  ///
  /// assert_eq!(Config::default().recv_buffer_size, 1152);
  /// ```
  pub recv_buffer_size: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config { msg: Msg::default(),
             default_port: 5683,
             multicast_group: crate::multicast::ALL_COAP_DEVICES_IP,
             recv_buffer_size: 1152 }
  }
}

impl Config {
  /// Longest time a CON exchange can go unanswered before it times out
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use nymea_coap::config::Config;
  ///
  /// assert_eq!(Config::default().max_transmit_wait(), Milliseconds(10_000u64));
  /// ```
  pub fn max_transmit_wait(&self) -> Milliseconds<u64> {
    self.msg.con.retry_strategy.max_time(self.msg.con.max_attempts)
  }
}
