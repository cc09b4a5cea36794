use core::fmt;
use std::net::SocketAddr;

use nymea_coap_msg::MessageToBytesError;

use crate::net::Socket;
use crate::platform::Platform;

/// The context that an error occurred in
#[derive(Debug, Clone, Copy)]
pub enum When {
  /// We were polling for a message when the error occurred
  Polling,
  /// We were sending a message
  SendingMessage(Option<SocketAddr>, nymea_coap_msg::Id, nymea_coap_msg::Token),
  /// No particular operation
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what<P: Platform>(self, what: What<P>) -> Error<P> {
    Error { when: self, what }
  }
}

/// An error encounterable while driving the engine.
///
/// These are I/O failures of the engine itself; the outcome of
/// an individual exchange is reported on its [`Reply`](crate::Reply).
#[derive(Debug)]
pub struct Error<P: Platform> {
  /// What happened?
  pub what: What<P>,
  /// What were we doing when it happened?
  pub when: When,
}

/// A contextless error with some additional debug data attached.
#[derive(Debug)]
pub enum What<P: Platform> {
  /// Some socket operation (e.g. sending a datagram) failed
  SockError(<<P as Platform>::Socket as Socket>::Error),
  /// Serializing a message to bytes failed
  ToBytes(MessageToBytesError),
  /// The clock failed to provide timing.
  ///
  /// See [`embedded_time::clock::Error`]
  ClockError,
}

impl<P: Platform> fmt::Display for Error<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.what {
      | What::SockError(e) => write!(f, "socket error: {:?}", e)?,
      | What::ToBytes(e) => write!(f, "could not serialize message: {:?}", e)?,
      | What::ClockError => write!(f, "clock error")?,
    }

    match self.when {
      | When::Polling => write!(f, " (while polling)"),
      | When::SendingMessage(addr, id, token) => {
        write!(f, " (while sending message {} {}", id, token)?;
        match addr {
          | Some(addr) => write!(f, " to {})", addr),
          | None => write!(f, ")"),
        }
      },
      | When::None => Ok(()),
    }
  }
}
