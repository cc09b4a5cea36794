use std::io;
use std::time::Duration;

use crate::coap::{Coap, Error};
use crate::config::Config;
use crate::platform::{Platform, Std};
use crate::reply::{Reply, ReplyHandle};
use crate::req::{Method, Request};

/// A blocking CoAP request client.
///
/// Each request ticks the underlying [`Coap`] until its exchange finishes.
/// Events other than the finished request (notifications, unsolicited
/// messages) stay queued and can be read through [`Client::coap_mut`].
#[allow(missing_debug_implementations)]
pub struct Client<P: Platform> {
  coap: Coap<P>,
}

impl Client<Std> {
  /// Create a new Client for a platform supporting Rust's standard library.
  ///
  /// ```no_run
  /// use nymea_coap::blocking::Client;
  /// use nymea_coap::Request;
  ///
  /// let mut client = Client::try_new_std(0).unwrap();
  /// let rep = client.get(Request::parse("coap://127.0.0.1/hello").unwrap())
  ///                 .unwrap();
  ///
  /// println!("Hello, {}!", rep.payload_str().unwrap());
  /// ```
  pub fn try_new_std(port: u16) -> io::Result<Self> {
    Self::try_new_std_config(port, Config::default())
  }

  /// Create a new std client with a specific config
  pub fn try_new_std_config(port: u16, config: Config) -> io::Result<Self> {
    Coap::<Std>::try_new_std_config(port, config).map(Self::new)
  }
}

impl<P: Platform> Client<P> {
  /// Wrap a client
  pub fn new(coap: Coap<P>) -> Self {
    Self { coap }
  }

  /// The wrapped client
  pub fn coap(&self) -> &Coap<P> {
    &self.coap
  }

  /// The wrapped client
  pub fn coap_mut(&mut self) -> &mut Coap<P> {
    &mut self.coap
  }

  /// Send a request and wait for its reply.
  ///
  /// The reply may still carry a [`ReplyError`](crate::ReplyError);
  /// `Err` is reserved for failures of the client itself.
  pub fn send(&mut self,
              method: Method,
              request: Request,
              payload: impl Into<Vec<u8>>)
              -> Result<Reply, Error<P>> {
    let handle = self.coap.custom_request(method, request, payload);
    self.wait(handle)
  }

  /// Ping an endpoint
  pub fn ping(&mut self, request: Request) -> Result<Reply, Error<P>> {
    let handle = self.coap.ping(request);
    self.wait(handle)
  }

  /// Send a GET request
  pub fn get(&mut self, request: Request) -> Result<Reply, Error<P>> {
    self.send(Method::Get, request, Vec::new())
  }

  /// Send a PUT request
  pub fn put(&mut self, request: Request, payload: impl Into<Vec<u8>>) -> Result<Reply, Error<P>> {
    self.send(Method::Put, request, payload)
  }

  /// Send a POST request
  pub fn post(&mut self, request: Request, payload: impl Into<Vec<u8>>) -> Result<Reply, Error<P>> {
    self.send(Method::Post, request, payload)
  }

  /// Send a DELETE request
  pub fn delete(&mut self, request: Request) -> Result<Reply, Error<P>> {
    self.send(Method::Delete, request, Vec::new())
  }

  /// Register as an observer; notifications arrive as events on [`Client::coap_mut`]
  pub fn observe(&mut self, request: Request) -> Result<Reply, Error<P>> {
    let handle = self.coap.enable_notifications(request);
    self.wait(handle)
  }

  /// Deregister as an observer
  pub fn stop_observing(&mut self, request: Request) -> Result<Reply, Error<P>> {
    let handle = self.coap.disable_notifications(request);
    self.wait(handle)
  }

  fn wait(&mut self, mut handle: ReplyHandle) -> Result<Reply, Error<P>> {
    loop {
      self.coap.tick()?;

      match self.coap.take_reply(handle) {
        | Ok(reply) => {
          self.coap.forget_finished(reply.id());
          return Ok(reply);
        },
        | Err(pending) => handle = pending,
      }

      std::thread::sleep(Duration::from_millis(1));
    }
  }
}

#[cfg(test)]
mod tests {
  use std::thread;
  use std::time::Duration;

  use nymea_coap_msg::{Code, Pdu, Type};

  use super::*;
  use crate::net::Addrd;
  use crate::reply::ReplyError;
  use crate::test::{ClockMock, Platform as Mock, ResolverMock, SockMock};

  #[test]
  fn send_waits_for_the_reply() {
    let sock = SockMock::new();
    let (rx, tx) = (sock.rx.clone(), sock.tx.clone());
    let mut client = Client::<Mock>::new(Coap::new(sock, ClockMock::new(), ResolverMock::default()));

    let server = thread::spawn(move || {
      let req = loop {
        match SockMock::sent(&tx).into_iter().next() {
          | Some(Addrd(req, _)) => break req,
          | None => thread::sleep(Duration::from_millis(1)),
        }
      };

      let mut rep = Pdu::new(Type::Ack, Code::CHANGED, req.id, req.token);
      rep.set_payload(req.payload().to_vec());
      SockMock::inject(&rx, &rep, "127.0.0.1:5683".parse().unwrap());
    });

    let reply = client.put(Request::parse("coap://127.0.0.1/echo").unwrap(), "ping")
                      .unwrap();
    server.join().unwrap();

    assert_eq!(reply.status_code(), Code::CHANGED);
    assert_eq!(reply.payload(), b"ping");
    assert!(client.coap_mut().poll_event().is_none());
  }

  #[test]
  fn failed_exchanges_are_replies() {
    let sock = SockMock::new();
    let mut client = Client::<Mock>::new(Coap::new(sock, ClockMock::new(), ResolverMock::default()));

    let reply = client.get(Request::parse("coap://nowhere.invalid/").unwrap())
                      .unwrap();
    assert_eq!(reply.error(), Some(ReplyError::HostNotFound));
  }
}
