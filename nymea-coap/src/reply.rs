use core::cell::RefCell;
use core::fmt;
use std::net::SocketAddr;
use std::rc::Rc;

use nymea_coap_msg::known::observe::Action;
use nymea_coap_msg::known::ContentFormat;
use nymea_coap_msg::{Code, Id, Token, Type};

use crate::req::{Method, Request};

/// Identifies one exchange for the lifetime of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyId(pub(crate) u64);

impl fmt::Display for ReplyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Why an exchange failed.
///
/// CoAP 4.xx / 5.xx response codes are not errors at this level;
/// they finish the reply successfully and are found in [`Reply::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyError {
  /// The host name of the URL could not be resolved
  HostNotFound,
  /// The server did not answer the request or any of its retransmissions
  Timeout,
  /// The URL scheme was not `coap`
  InvalidUrlScheme,
  /// A datagram received while waiting for the response could not be decoded
  InvalidPdu,
}

impl ReplyError {
  /// Human-readable description of the error
  ///
  /// ```
  /// use nymea_coap::ReplyError;
  ///
  /// assert_eq!(ReplyError::Timeout.message(),
  ///            "The server did not respond after 4 retransmissions.");
  /// ```
  pub fn message(&self) -> &'static str {
    match self {
      | ReplyError::HostNotFound => "The remote host name was not found (invalid hostname).",
      | ReplyError::Timeout => "The server did not respond after 4 retransmissions.",
      | ReplyError::InvalidUrlScheme => "The given URL does not have a valid scheme.",
      | ReplyError::InvalidPdu => {
        "The package data unit (PDU) could not be parsed successfully."
      },
    }
  }
}

impl fmt::Display for ReplyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.message())
  }
}

impl std::error::Error for ReplyError {}

/// The state of one exchange: a request and everything the engine
/// learned while carrying it out.
///
/// Replies are owned by the engine until they are finished and
/// taken back with [`Coap::take_reply`](crate::Coap::take_reply).
#[derive(Debug, Clone)]
pub struct Reply {
  pub(crate) id: ReplyId,
  pub(crate) request: Request,
  pub(crate) method: Method,
  pub(crate) request_payload: Vec<u8>,
  pub(crate) payload: Vec<u8>,
  pub(crate) status_code: Code,
  pub(crate) content_format: ContentFormat,
  pub(crate) message_type: Type,
  pub(crate) error: Option<ReplyError>,
  pub(crate) finished: bool,
  pub(crate) running: bool,
  pub(crate) retransmissions: u16,
  pub(crate) message_id: Id,
  pub(crate) token: Token,
  pub(crate) observation: Option<Action>,
  pub(crate) looked_up: bool,
  pub(crate) peer: Option<SocketAddr>,
  pub(crate) request_data: Vec<u8>,
}

impl Reply {
  pub(crate) fn new(id: ReplyId, request: Request, method: Method, request_payload: Vec<u8>) -> Self {
    Reply { id,
            request,
            method,
            request_payload,
            payload: Vec::new(),
            status_code: Code::EMPTY,
            content_format: ContentFormat::Text,
            message_type: Type::Ack,
            error: None,
            finished: false,
            running: false,
            retransmissions: 1,
            message_id: Id(0),
            token: Token::default(),
            observation: None,
            looked_up: false,
            peer: None,
            request_data: Vec::new() }
  }

  /// Whether a datagram has been sent for this reply
  pub(crate) fn is_sent(&self) -> bool {
    !self.request_data.is_empty()
  }

  /// This reply's id
  pub fn id(&self) -> ReplyId {
    self.id
  }

  /// The request this reply answers
  pub fn request(&self) -> &Request {
    &self.request
  }

  /// The method the request was sent with
  pub fn method(&self) -> Method {
    self.method
  }

  /// The payload the request was sent with
  pub fn request_payload(&self) -> &[u8] {
    &self.request_payload
  }

  /// Whether the exchange is over, successfully or not
  pub fn is_finished(&self) -> bool {
    self.finished
  }

  /// Whether the retransmission timer is armed, i.e. the last
  /// request sent has not been acknowledged yet
  pub fn is_running(&self) -> bool {
    self.running
  }

  /// Why the exchange failed, if it did
  pub fn error(&self) -> Option<ReplyError> {
    self.error
  }

  /// [`ReplyError::message`], or the empty string if there is no error
  pub fn error_string(&self) -> &'static str {
    self.error.map(|e| e.message()).unwrap_or("")
  }

  /// The response payload (every block of it, for blockwise responses)
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }

  /// The response payload as UTF-8, if it is
  pub fn payload_str(&self) -> Option<&str> {
    core::str::from_utf8(&self.payload).ok()
  }

  /// Content-Format of the response payload
  pub fn content_format(&self) -> ContentFormat {
    self.content_format
  }

  /// Response code ([`Code::EMPTY`] until a response arrived)
  pub fn status_code(&self) -> Code {
    self.status_code
  }

  /// Message type of the last response received
  pub fn message_type(&self) -> Type {
    self.message_type
  }

  /// The address the request was sent to
  pub fn peer(&self) -> Option<SocketAddr> {
    self.peer
  }
}

impl fmt::Display for Reply {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Reply({}) {} {}", self.id, self.method, self.request.url())?;

    if self.finished {
      write!(f, " -> {}", self.status_code)?;
    }

    match self.error {
      | Some(e) => write!(f, " ({:?})", e),
      | None => Ok(()),
    }
  }
}

/// Returned by every request submitted to the engine.
///
/// A handle is the caller's claim on the reply; it cannot be cloned.
/// Dropping it detaches the exchange from the engine on the next tick:
/// a queued exchange is removed from the queue, an active one is
/// abandoned (its retransmissions stop and the next queued exchange
/// starts) and a finished one is freed.
#[derive(Debug)]
pub struct ReplyHandle {
  id: ReplyId,
  detached: Rc<RefCell<Vec<ReplyId>>>,
  detach_on_drop: bool,
}

impl ReplyHandle {
  pub(crate) fn new(id: ReplyId, detached: Rc<RefCell<Vec<ReplyId>>>) -> Self {
    ReplyHandle { id,
                  detached,
                  detach_on_drop: true }
  }

  /// The reply this handle refers to
  pub fn id(&self) -> ReplyId {
    self.id
  }

  /// Consume the handle without detaching its reply
  pub(crate) fn release(mut self) {
    self.detach_on_drop = false;
  }
}

impl Drop for ReplyHandle {
  fn drop(&mut self) {
    if !self.detach_on_drop {
      return;
    }

    if let Ok(mut detached) = self.detached.try_borrow_mut() {
      detached.push(self.id);
    }
  }
}
