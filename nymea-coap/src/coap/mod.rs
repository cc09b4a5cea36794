use core::cell::RefCell;
use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;

use embedded_time::duration::Milliseconds;
use embedded_time::{Clock as _, Instant};
use nymea_coap_msg::known::observe::{self, Action};
use nymea_coap_msg::known::{self, Block, ContentFormat};
use nymea_coap_msg::{Code, Id, Pdu, Token, Type};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tinyvec::ArrayVec;

use crate::config::{Config, BLOCK_SIZE, BLOCK_SZX};
use crate::logging;
use crate::net::{Addrd, Resolve, Socket};
use crate::observe::ObserveResource;
use crate::platform::Platform;
use crate::reply::{Reply, ReplyError, ReplyHandle, ReplyId};
use crate::req::{Method, Request};
use crate::retry::{RetryTimer, YouShould};
use crate::time::{millis_since_epoch, Millis};

mod deadline;
mod error;

use deadline::{Deadlines, Key};
#[doc(inline)]
pub use error::*;

/// Something that happened while the engine was being driven
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  /// An exchange reached its final state; its [`Reply`] can now be taken
  Finished(ReplyId),
  /// An observed resource changed
  Notification {
    /// The resource that changed
    resource: ObserveResource,
    /// The Observe sequence number of the notification
    /// (of its first block, for notifications that arrived blockwise)
    sequence: u32,
    /// The complete representation
    payload: Vec<u8>,
    /// Content-Format of `payload`
    content_format: ContentFormat,
  },
  /// A message arrived that belonged to no exchange or observation.
  ///
  /// Confirmable and non-confirmable messages have already been rejected
  /// with a Reset by the time this is seen.
  Unsolicited(Addrd<Pdu>),
}

struct Exchange<C: crate::time::Clock> {
  reply: Reply,
  timer: Option<RetryTimer<C>>,
}

/// The remaining blocks of a notification too large for one datagram
struct NotificationFetch<C: crate::time::Clock> {
  resource: ObserveResource,
  sequence: u32,
  content_format: ContentFormat,
  payload: Vec<u8>,
  token: Token,
  message_id: Id,
  peer: SocketAddr,
  request_data: Vec<u8>,
  timer: RetryTimer<C>,
}

/// A CoAP client.
///
/// Requests are queued and sent one at a time; the next one only
/// leaves once the previous exchange has finished.
///
/// Nothing happens until [`Coap::tick`] is called. Each tick reads every
/// datagram waiting on the socket, fires retransmissions whose time has
/// come and sends the next queued request. Results are reported through
/// [`Coap::poll_event`] and collected with [`Coap::take_reply`].
///
/// ```
/// use nymea_coap::platform::Std;
/// use nymea_coap::{Coap, Request};
///
/// let mut coap = Coap::<Std>::try_new_std(0).unwrap();
/// let reply = coap.get(Request::parse("coap://127.0.0.1:5683/.well-known/core").unwrap());
///
/// coap.tick().unwrap();
/// assert!(!coap.reply(&reply).unwrap().is_finished());
/// ```
pub struct Coap<P: Platform> {
  sock: P::Socket,
  pub(crate) clock: P::Clock,
  resolver: P::Resolver,
  config: Config,
  rand: ChaCha8Rng,
  next_message_id: Id,
  next_reply_id: u64,
  token_counter: u64,
  exchanges: HashMap<ReplyId, Exchange<P::Clock>>,
  queue: VecDeque<ReplyId>,
  active: Option<ReplyId>,
  observers: HashMap<Token, ObserveResource>,
  fetch: Option<NotificationFetch<P::Clock>>,
  deadlines: Deadlines,
  events: VecDeque<Event>,
  detached: Rc<RefCell<Vec<ReplyId>>>,
  buffer: Vec<u8>,
}

impl<P: Platform> fmt::Debug for Coap<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Coap")
     .field("local_addr", &self.sock.local_addr())
     .field("active", &self.active)
     .field("queued", &self.queue)
     .field("observed", &self.observers.len())
     .field("pending_events", &self.events.len())
     .finish()
  }
}

impl<P: Platform> Coap<P> {
  /// Create a client with the default [`Config`]
  pub fn new(sock: P::Socket, clock: P::Clock, resolver: P::Resolver) -> Self {
    Self::new_config(Config::default(), sock, clock, resolver)
  }

  /// Create a client
  pub fn new_config(config: Config,
                    sock: P::Socket,
                    clock: P::Clock,
                    resolver: P::Resolver)
                    -> Self {
    let now = clock.try_now().map(millis_since_epoch).unwrap_or(0);
    let mut rand = ChaCha8Rng::seed_from_u64(now ^ (u64::from(config.msg.token_seed) << 48));
    let next_message_id = Id(rand.gen());

    Coap { buffer: vec![0; config.recv_buffer_size],
           sock,
           clock,
           resolver,
           config,
           rand,
           next_message_id,
           next_reply_id: 0,
           token_counter: 0,
           exchanges: HashMap::new(),
           queue: VecDeque::new(),
           active: None,
           observers: HashMap::new(),
           fetch: None,
           deadlines: Deadlines::default(),
           events: VecDeque::new(),
           detached: Rc::new(RefCell::new(Vec::new())),
           }
  }

  /// The configuration this client was created with
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// The address our socket is bound to
  pub fn local_addr(&self) -> SocketAddr {
    self.sock.local_addr()
  }

  /// Send an empty confirmable message; the exchange finishes when
  /// the server answers with a Reset (or an empty ACK).
  pub fn ping(&mut self, request: Request) -> ReplyHandle {
    self.submit(Method::Empty, request, Vec::new(), None)
  }

  /// Queue a GET request
  pub fn get(&mut self, request: Request) -> ReplyHandle {
    self.submit(Method::Get, request, Vec::new(), None)
  }

  /// Queue a PUT request.
  ///
  /// Payloads larger than one block are uploaded blockwise.
  pub fn put(&mut self, request: Request, payload: impl Into<Vec<u8>>) -> ReplyHandle {
    self.submit(Method::Put, request, payload.into(), None)
  }

  /// Queue a POST request.
  ///
  /// Payloads larger than one block are uploaded blockwise.
  pub fn post(&mut self, request: Request, payload: impl Into<Vec<u8>>) -> ReplyHandle {
    self.submit(Method::Post, request, payload.into(), None)
  }

  /// Queue a DELETE request
  pub fn delete(&mut self, request: Request) -> ReplyHandle {
    self.submit(Method::Delete, request, Vec::new(), None)
  }

  /// Queue a request with an arbitrary method.
  ///
  /// `payload` is ignored for methods that do not carry one.
  pub fn custom_request(&mut self,
                        method: Method,
                        request: Request,
                        payload: impl Into<Vec<u8>>)
                        -> ReplyHandle {
    let payload = if method.has_payload() {
      payload.into()
    } else {
      Vec::new()
    };

    self.submit(method, request, payload, None)
  }

  /// Register as an observer of a resource.
  ///
  /// The resource shows up in [`Coap::observed_resources`] as soon as
  /// the registration is sent, and every notification it emits arrives
  /// as an [`Event::Notification`].
  pub fn enable_notifications(&mut self, request: Request) -> ReplyHandle {
    self.submit(Method::Get, request, Vec::new(), Some(Action::Register))
  }

  /// Stop observing a resource, reusing the token it was registered with
  pub fn disable_notifications(&mut self, request: Request) -> ReplyHandle {
    self.submit(Method::Get, request, Vec::new(), Some(Action::Deregister))
  }

  /// Look at the state of an exchange
  pub fn reply(&self, handle: &ReplyHandle) -> Option<&Reply> {
    self.exchanges.get(&handle.id()).map(|ex| &ex.reply)
  }

  /// Take ownership of a finished reply, releasing its record.
  ///
  /// Hands the handle back when the exchange has not finished yet.
  pub fn take_reply(&mut self, handle: ReplyHandle) -> Result<Reply, ReplyHandle> {
    let id = handle.id();

    match self.exchanges.get(&id) {
      | Some(ex) if ex.reply.finished => (),
      | _ => return Err(handle),
    }

    match self.exchanges.remove(&id) {
      | Some(ex) => {
        handle.release();
        Ok(ex.reply)
      },
      | None => Err(handle),
    }
  }

  /// Pop the oldest event that has not been seen yet
  pub fn poll_event(&mut self) -> Option<Event> {
    self.events.pop_front()
  }

  pub(crate) fn forget_finished(&mut self, id: ReplyId) {
    self.events
        .retain(|e| !matches!(e, Event::Finished(finished) if *finished == id));
  }

  /// Resources we have registered as an observer of
  pub fn observed_resources(&self) -> impl Iterator<Item = &ObserveResource> {
    self.observers.values()
  }

  /// Join a multicast group, [`Config::multicast_group`] if `group` is `None`
  pub fn join_multicast_group(&self, group: Option<IpAddr>) -> Result<(), Error<P>> {
    let group = group.unwrap_or(IpAddr::V4(self.config.multicast_group));
    self.sock
        .join_multicast(group)
        .map_err(|e| When::None.what(What::SockError(e)))?;

    log::info!("joined multicast group {}", group);
    Ok(())
  }

  /// Leave a multicast group, [`Config::multicast_group`] if `group` is `None`
  pub fn leave_multicast_group(&self, group: Option<IpAddr>) -> Result<(), Error<P>> {
    let group = group.unwrap_or(IpAddr::V4(self.config.multicast_group));
    self.sock
        .leave_multicast(group)
        .map_err(|e| When::None.what(What::SockError(e)))?;

    log::info!("left multicast group {}", group);
    Ok(())
  }

  /// The earliest pending retransmission, in milliseconds since the clock's epoch.
  ///
  /// Callers that sleep between ticks should not sleep past this.
  pub fn next_deadline(&mut self) -> Option<Millis> {
    self.deadlines.next().map(Milliseconds)
  }

  /// Drive the client: read incoming datagrams, retransmit what is due
  /// and send the next queued request.
  pub fn tick(&mut self) -> Result<(), Error<P>> {
    self.sweep_detached();

    let now = self.clock
                  .try_now()
                  .map_err(|_| When::Polling.what(What::ClockError))?;

    while let Some(dgram) = self.sock
                                .poll(&mut self.buffer)
                                .map_err(|e| When::Polling.what(What::SockError(e)))?
    {
      self.dgram_recvd(dgram, now)?;
    }

    while let Some(key) = self.deadlines.pop_due(millis_since_epoch(now)) {
      match key {
        | Key::Reply(id) => self.retransmit(id, now)?,
        | Key::NotificationFetch => self.retransmit_fetch(now)?,
      }
    }

    self.drive_active(now)
  }

  fn submit(&mut self,
            method: Method,
            request: Request,
            payload: Vec<u8>,
            observation: Option<Action>)
            -> ReplyHandle {
    self.sweep_detached();

    let id = ReplyId(self.next_reply_id);
    self.next_reply_id += 1;

    let mut reply = Reply::new(id, request, method, payload);
    reply.observation = observation;
    let handle = ReplyHandle::new(id, self.detached.clone());

    if !reply.request.is_coap() {
      log::warn!("{} rejected: {} is not a coap url", id, reply.request.url());
      reply.error = Some(ReplyError::InvalidUrlScheme);
      reply.finished = true;
      self.exchanges.insert(id, Exchange { reply, timer: None });
      self.events.push_back(Event::Finished(id));
      return handle;
    }

    log::debug!("{} queued: {} {}", id, method, reply.request.url());
    self.exchanges.insert(id, Exchange { reply, timer: None });

    match self.active {
      | None => self.active = Some(id),
      | Some(_) => self.queue.push_back(id),
    }

    handle
  }

  fn sweep_detached(&mut self) {
    let ids = match self.detached.try_borrow_mut() {
      | Ok(mut ids) => core::mem::take(&mut *ids),
      | Err(_) => return,
    };

    ids.into_iter().for_each(|id| self.detach(id));
  }

  fn detach(&mut self, id: ReplyId) {
    if self.exchanges.remove(&id).is_none() {
      return;
    }

    self.queue.retain(|queued| *queued != id);
    self.deadlines.cancel(Key::Reply(id));
    self.forget_finished(id);

    if self.active == Some(id) {
      log::debug!("{} abandoned while in flight", id);
      self.active = None;
      self.activate_next();
    }
  }

  fn activate_next(&mut self) {
    while let Some(next) = self.queue.pop_front() {
      if self.exchanges.contains_key(&next) {
        self.active = Some(next);
        return;
      }
    }
  }

  fn finish(&mut self, id: ReplyId, error: Option<ReplyError>) {
    match self.exchanges.get_mut(&id) {
      | Some(ex) if !ex.reply.finished => {
        ex.reply.error = error;
        ex.reply.finished = true;
        ex.reply.running = false;
        ex.timer = None;

        match error {
          | Some(e) => log::warn!("{} failed: {}", id, e),
          | None => log::debug!("{} finished: {}", id, ex.reply.status_code),
        }
      },
      | _ => return,
    }

    self.deadlines.cancel(Key::Reply(id));
    self.events.push_back(Event::Finished(id));

    if self.active == Some(id) {
      self.active = None;
      self.activate_next();
    }
  }

  fn stop_timer(&mut self, id: ReplyId) {
    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.timer = None;
      ex.reply.running = false;
    }

    self.deadlines.cancel(Key::Reply(id));
  }

  /// The active exchange, if its request has been sent and it awaits an answer
  fn awaiting(&self) -> Option<ReplyId> {
    self.active.filter(|id| {
                 self.exchanges
                     .get(id)
                     .map(|ex| ex.reply.is_sent() && !ex.reply.finished)
                     .unwrap_or(false)
               })
  }

  fn next_id(&mut self) -> Id {
    let id = self.next_message_id;
    self.next_message_id = id.next();
    id
  }

  /// A token of 1 to 7 bytes that no observation or fetch is using
  fn next_token(&mut self, now: Instant<P::Clock>) -> Token {
    loop {
      self.token_counter = self.token_counter.wrapping_add(1);

      let mut seed = ArrayVec::<[u8; 18]>::new();
      seed.extend(self.config.msg.token_seed.to_be_bytes());
      seed.extend(self.token_counter.to_be_bytes());
      seed.extend(millis_since_epoch(now).to_be_bytes());

      let len = self.rand.gen_range(1..=7usize);
      let token = Token::opaque(&seed).truncated(len);

      let in_use = self.observers.contains_key(&token)
                   || self.fetch.as_ref().map(|f| f.token == token).unwrap_or(false);
      if !in_use {
        return token;
      }
    }
  }

  fn drive_active(&mut self, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    while let Some(id) = self.active {
      let (host, host_ip, port) = match self.exchanges.get(&id) {
        | Some(ex) if ex.reply.is_sent() => return Ok(()),
        | Some(ex) => (ex.reply.request.host().map(String::from),
                       ex.reply.request.host_ip(),
                       ex.reply.request.port(self.config.default_port)),
        | None => {
          self.active = None;
          self.activate_next();
          continue;
        },
      };

      let (ip, looked_up) = match (host_ip, host) {
        | (Some(ip), _) => (ip, false),
        | (None, Some(host)) => match self.resolver.resolve(&host, port) {
          | Ok(ips) => match ips.first() {
            | Some(ip) => {
              log::debug!("{} resolved to {}", host, ip);
              (*ip, true)
            },
            | None => {
              log::warn!("{} has no addresses", host);
              self.finish(id, Some(ReplyError::HostNotFound));
              continue;
            },
          },
          | Err(nb::Error::WouldBlock) => return Ok(()),
          | Err(nb::Error::Other(e)) => {
            log::warn!("could not resolve {}: {:?}", host, e);
            self.finish(id, Some(ReplyError::HostNotFound));
            continue;
          },
        },
        | (None, None) => {
          self.finish(id, Some(ReplyError::HostNotFound));
          continue;
        },
      };

      if let Some(ex) = self.exchanges.get_mut(&id) {
        ex.reply.peer = Some(SocketAddr::new(ip, port));
        ex.reply.looked_up = looked_up;
      }

      self.send_request(id, now)?;
    }

    Ok(())
  }

  fn send_request(&mut self, id: ReplyId, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let (method, observation, url) = match self.exchanges.get(&id) {
      | Some(ex) => (ex.reply.method, ex.reply.observation, ex.reply.request.url().clone()),
      | None => return Ok(()),
    };

    let message_id = self.next_id();
    let mut token = match method {
      | Method::Empty => Token::default(),
      | _ => self.next_token(now),
    };

    match observation.filter(|_| method == Method::Get) {
      | Some(Action::Register) => {
        log::debug!("observing {} with token {}", url, token);
        self.observers
            .insert(token, ObserveResource::new(url, token));
      },
      | Some(Action::Deregister) => {
        let registered = self.observers
                             .values()
                             .find(|resource| resource.url() == &url)
                             .map(|resource| resource.token());

        match registered {
          | Some(registered) => {
            self.observers.remove(&registered);
            token = registered;
          },
          | None => log::warn!("{} was not being observed", url),
        }
      },
      | None => (),
    }

    let pdu = match self.exchanges.get(&id) {
      | Some(ex) => self.request_pdu(&ex.reply, message_id, token),
      | None => return Ok(()),
    };

    self.transmit(id, pdu, now)
  }

  /// Uri-Host (when `with_host`), Uri-Port (when not the default),
  /// Uri-Path and Uri-Query
  fn add_uri_options(&self, pdu: &mut Pdu, request: &Request, with_host: bool) {
    if with_host {
      if let Some(host) = request.host() {
        pdu.add_option(known::HOST, host);
      }
    }

    let port = request.port(self.config.default_port);
    if port != self.config.default_port {
      pdu.add_option(known::PORT, observe::uint_bytes(port.into()));
    }

    request.path_segments()
           .for_each(|segment| pdu.add_option(known::PATH, segment));
    request.query_params()
           .for_each(|param| pdu.add_option(known::QUERY, param));
  }

  fn request_pdu(&self, reply: &Reply, message_id: Id, token: Token) -> Pdu {
    let mut pdu = Pdu::new(reply.request.message_type(),
                           reply.method.code(),
                           message_id,
                           token);

    // a ping is a bare empty message
    if reply.method == Method::Empty {
      return pdu;
    }

    self.add_uri_options(&mut pdu, &reply.request, reply.looked_up);

    if reply.method == Method::Get {
      if let Some(action) = reply.observation {
        pdu.add_option(known::OBSERVE, observe::uint_bytes(u8::from(action).into()));
      }

      pdu.add_option(known::BLOCK2, Block::new(0, BLOCK_SZX, false).to_bytes());
    }

    if reply.method.has_payload() {
      pdu.add_option(known::CONTENT_FORMAT, reply.request.content_format().bytes());

      let body = &reply.request_payload;
      if body.len() > BLOCK_SIZE {
        pdu.add_option(known::BLOCK1, Block::new(0, BLOCK_SZX, true).to_bytes());
        pdu.set_payload(body[..BLOCK_SIZE].to_vec());
      } else {
        pdu.set_payload(body.clone());
      }
    }

    pdu
  }

  /// Next message of an exchange already in progress: same token, fresh id
  fn continuation_pdu(&self, reply: &Reply, message_id: Id) -> Pdu {
    let mut pdu = Pdu::new(reply.request.message_type(),
                           reply.method.code(),
                           message_id,
                           reply.token);
    self.add_uri_options(&mut pdu, &reply.request, reply.looked_up);
    pdu
  }

  /// Send a message on behalf of an exchange, (re)arming its retransmission
  /// timer when the message is confirmable
  fn transmit(&mut self, id: ReplyId, pdu: Pdu, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let peer = match self.exchanges.get(&id).and_then(|ex| ex.reply.peer) {
      | Some(peer) => peer,
      | None => return Ok(()),
    };

    let bytes = match pdu.pack() {
      | Ok(bytes) => bytes,
      | Err(e) => {
        self.finish(id, Some(ReplyError::InvalidPdu));
        return Err(When::SendingMessage(Some(peer), pdu.id, pdu.token).what(What::ToBytes(e)));
      },
    };

    let confirmable = pdu.ty == Type::Con;
    let timer = if confirmable {
      Some(RetryTimer::new(now,
                           self.config.msg.con.retry_strategy,
                           self.config.msg.con.max_attempts))
    } else {
      None
    };
    let due = timer.as_ref()
                   .map(|timer| millis_since_epoch(timer.next_attempt_at()));

    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.reply.message_id = pdu.id;
      ex.reply.token = pdu.token;
      ex.reply.request_data = bytes.clone();
      ex.reply.retransmissions = 1;
      ex.reply.running = confirmable;
      ex.timer = timer;
    }

    match due {
      | Some(at) => self.deadlines.schedule(Key::Reply(id), at),
      | None => self.deadlines.cancel(Key::Reply(id)),
    }

    log::trace!("sending {} -> {}", logging::pdu_summary(&pdu), peer);
    self.send_dgram(Addrd(&bytes, peer), pdu.id, pdu.token)?;

    if !confirmable {
      self.finish(id, None);
    }

    Ok(())
  }

  fn send_dgram(&self, dgram: Addrd<&[u8]>, id: Id, token: Token) -> Result<(), Error<P>> {
    match self.sock.send(dgram) {
      | Ok(()) => Ok(()),
      | Err(nb::Error::WouldBlock) => {
        log::debug!("socket busy, {} to {} left to retransmission", id, dgram.addr());
        Ok(())
      },
      | Err(nb::Error::Other(e)) => {
        Err(When::SendingMessage(Some(dgram.addr()), id, token).what(What::SockError(e)))
      },
    }
  }

  /// Send a message that belongs to no exchange (ACKs and Resets)
  fn send_pdu(&self, pdu: &Pdu, to: SocketAddr) -> Result<(), Error<P>> {
    let bytes =
      pdu.pack()
         .map_err(|e| When::SendingMessage(Some(to), pdu.id, pdu.token).what(What::ToBytes(e)))?;

    log::trace!("sending {} -> {}", logging::pdu_summary(pdu), to);
    self.send_dgram(Addrd(&bytes, to), pdu.id, pdu.token)
  }

  fn retransmit(&mut self, id: ReplyId, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let ex = match self.exchanges.get_mut(&id) {
      | Some(ex) => ex,
      | None => return Ok(()),
    };
    let timer = match ex.timer.as_mut() {
      | Some(timer) => timer,
      | None => return Ok(()),
    };

    match timer.what_should_i_do(now) {
      | Ok(YouShould::Retry) => {
        let due = millis_since_epoch(timer.next_attempt_at());
        let max = timer.max_attempts().0.saturating_sub(1);
        ex.reply.retransmissions += 1;

        log::debug!("resending {} ({}/{})",
                    ex.reply.message_id,
                    ex.reply.retransmissions - 1,
                    max);

        let (bytes, peer, message_id, token) = (ex.reply.request_data.clone(),
                                                ex.reply.peer,
                                                ex.reply.message_id,
                                                ex.reply.token);
        self.deadlines.schedule(Key::Reply(id), due);

        match peer {
          | Some(peer) => self.send_dgram(Addrd(&bytes, peer), message_id, token),
          | None => Ok(()),
        }
      },
      | Ok(YouShould::Cry) => {
        self.finish(id, Some(ReplyError::Timeout));
        Ok(())
      },
      | Err(nb::Error::WouldBlock) => {
        let due = millis_since_epoch(timer.next_attempt_at());
        self.deadlines.schedule(Key::Reply(id), due);
        Ok(())
      },
      | Err(nb::Error::Other(never)) => match never {},
    }
  }

  fn retransmit_fetch(&mut self, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let fetch = match self.fetch.as_mut() {
      | Some(fetch) => fetch,
      | None => return Ok(()),
    };

    match fetch.timer.what_should_i_do(now) {
      | Ok(YouShould::Retry) => {
        let due = millis_since_epoch(fetch.timer.next_attempt_at());
        log::debug!("resending {} ({}/{})",
                    fetch.message_id,
                    fetch.timer.attempts().0.saturating_sub(1),
                    fetch.timer.max_attempts().0.saturating_sub(1));

        let (bytes, peer, message_id, token) =
          (fetch.request_data.clone(), fetch.peer, fetch.message_id, fetch.token);
        self.deadlines.schedule(Key::NotificationFetch, due);
        self.send_dgram(Addrd(&bytes, peer), message_id, token)
      },
      | Ok(YouShould::Cry) => {
        log::warn!("gave up fetching the rest of a notification from {}",
                   fetch.resource);
        self.fetch = None;
        Ok(())
      },
      | Err(nb::Error::WouldBlock) => {
        let due = millis_since_epoch(fetch.timer.next_attempt_at());
        self.deadlines.schedule(Key::NotificationFetch, due);
        Ok(())
      },
      | Err(nb::Error::Other(never)) => match never {},
    }
  }

  fn dgram_recvd(&mut self, dgram: Addrd<Vec<u8>>, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let from = dgram.addr();
    let pdu = Pdu::unpack(dgram.data());

    if let Some(e) = pdu.error() {
      log::warn!("could not parse {}b from {}: {:?}", dgram.data().len(), from, e);
      if let Some(id) = self.awaiting() {
        self.finish(id, Some(ReplyError::InvalidPdu));
      }
      return Ok(());
    }

    log::trace!("recvd {} <- {}", logging::pdu_summary(&pdu), from);

    if let Some(id) = self.awaiting() {
      let (message_id, token) = match self.exchanges.get(&id) {
        | Some(ex) => (ex.reply.message_id, ex.reply.token),
        | None => return Ok(()),
      };

      if pdu.id == message_id {
        return self.response_by_id(id, pdu, now);
      }

      if !token.is_empty() && pdu.token == token {
        return self.response_by_token(id, pdu, from);
      }
    }

    if self.fetch
           .as_ref()
           .map(|f| f.token == pdu.token)
           .unwrap_or(false)
    {
      return self.fetch_recvd(pdu, from, now);
    }

    if let Some(resource) = self.observers.get(&pdu.token).cloned() {
      return self.notification_recvd(resource, pdu, from, now);
    }

    self.unsolicited(pdu, from)
  }

  /// A piggybacked response (or an empty ACK / Reset) to the active exchange
  fn response_by_id(&mut self, id: ReplyId, pdu: Pdu, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.reply.message_type = pdu.ty;
    }

    if pdu.ty == Type::Ack && pdu.code == Code::EMPTY {
      log::debug!("{} acknowledged, waiting for a separate response", id);
      self.stop_timer(id);
      return Ok(());
    }

    if pdu.ty == Type::Ack {
      if let Some(block) = pdu.block1() {
        return self.continue_upload(id, &pdu, block, now);
      }

      if let Some(block) = pdu.block2() {
        return self.continue_download(id, &pdu, block, now);
      }
    }

    self.complete(id, &pdu);
    Ok(())
  }

  /// A separate response to the active exchange
  fn response_by_token(&mut self, id: ReplyId, pdu: Pdu, from: SocketAddr) -> Result<(), Error<P>> {
    log::debug!("{} got a separate response", id);
    self.complete(id, &pdu);

    if pdu.ty == Type::Con {
      self.send_pdu(&Pdu::new(Type::Ack, Code::EMPTY, pdu.id, Token::default()),
                    from)?;
    }

    Ok(())
  }

  fn complete(&mut self, id: ReplyId, pdu: &Pdu) {
    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.reply.payload.extend_from_slice(pdu.payload());
      ex.reply.status_code = pdu.code;
      ex.reply.content_format = pdu.content_format();
      ex.reply.message_type = pdu.ty;
    }

    self.finish(id, None);
  }

  fn continue_upload(&mut self,
                     id: ReplyId,
                     ack: &Pdu,
                     block: Block,
                     now: Instant<P::Clock>)
                     -> Result<(), Error<P>> {
    let total = match self.exchanges.get(&id) {
      | Some(ex) => ex.reply.request_payload.len(),
      | None => return Ok(()),
    };

    let offset = (block.num() as usize + 1).saturating_mul(BLOCK_SIZE);
    if offset >= total {
      self.complete(id, ack);
      return Ok(());
    }

    let end = total.min(offset + BLOCK_SIZE);
    let num = block.num() + 1;
    let message_id = self.next_id();

    let pdu = match self.exchanges.get(&id) {
      | Some(ex) => {
        let mut pdu = self.continuation_pdu(&ex.reply, message_id);
        pdu.add_option(known::CONTENT_FORMAT, ex.reply.request.content_format().bytes());
        pdu.add_option(known::BLOCK1, Block::new(num, BLOCK_SZX, end < total).to_bytes());
        pdu.set_payload(ex.reply.request_payload[offset..end].to_vec());
        pdu
      },
      | None => return Ok(()),
    };

    log::debug!("{} uploading block {} ({}..{} of {}b)", id, num, offset, end, total);
    self.transmit(id, pdu, now)
  }

  fn continue_download(&mut self,
                       id: ReplyId,
                       response: &Pdu,
                       block: Block,
                       now: Instant<P::Clock>)
                       -> Result<(), Error<P>> {
    if !block.more() {
      self.complete(id, response);
      return Ok(());
    }

    if let Some(ex) = self.exchanges.get_mut(&id) {
      ex.reply.payload.extend_from_slice(response.payload());
    }

    let message_id = self.next_id();
    let pdu = match self.exchanges.get(&id) {
      | Some(ex) => {
        let mut pdu = self.continuation_pdu(&ex.reply, message_id);
        pdu.add_option(known::BLOCK2,
                       Block::new(block.num() + 1, BLOCK_SZX, false).to_bytes());
        pdu
      },
      | None => return Ok(()),
    };

    log::debug!("{} requesting block {}", id, block.num() + 1);
    self.transmit(id, pdu, now)
  }

  fn notification_recvd(&mut self,
                        resource: ObserveResource,
                        pdu: Pdu,
                        from: SocketAddr,
                        now: Instant<P::Clock>)
                        -> Result<(), Error<P>> {
    let sequence = pdu.observe_sequence().unwrap_or(0);
    log::debug!("notification {} from {}", sequence, resource);

    // acknowledged whatever its type
    let ack = Pdu::ack(&pdu);

    match pdu.block2() {
      | Some(block) if block.num() == 0 && block.more() => {
        self.send_pdu(&ack, from)?;
        self.start_fetch(resource, sequence, &pdu, from, now)
      },
      | _ => {
        self.events.push_back(Event::Notification { resource,
                                                    sequence,
                                                    content_format: pdu.content_format(),
                                                    payload: pdu.payload().to_vec() });
        self.send_pdu(&ack, from)
      },
    }
  }

  /// Request the remaining blocks of a notification whose first block just arrived
  fn start_fetch(&mut self,
                 resource: ObserveResource,
                 sequence: u32,
                 first: &Pdu,
                 from: SocketAddr,
                 now: Instant<P::Clock>)
                 -> Result<(), Error<P>> {
    let message_id = self.next_id();
    let token = self.next_token(now);

    let request = Request::new(resource.url().clone());
    let mut get = Pdu::new(Type::Con, Code::GET, message_id, token);
    self.add_uri_options(&mut get, &request, request.host_ip().is_none());
    get.add_option(known::BLOCK2, Block::new(1, BLOCK_SZX, false).to_bytes());

    let bytes = get.pack()
                   .map_err(|e| When::SendingMessage(Some(from), message_id, token).what(What::ToBytes(e)))?;

    if let Some(previous) = self.fetch.take() {
      log::warn!("abandoning unfinished notification from {}", previous.resource);
    }

    let timer = RetryTimer::new(now,
                                self.config.msg.con.retry_strategy,
                                self.config.msg.con.max_attempts);
    self.deadlines
        .schedule(Key::NotificationFetch, millis_since_epoch(timer.next_attempt_at()));

    self.fetch = Some(NotificationFetch { resource,
                                          sequence,
                                          content_format: first.content_format(),
                                          payload: first.payload().to_vec(),
                                          token,
                                          message_id,
                                          peer: from,
                                          request_data: bytes.clone(),
                                          timer });

    log::trace!("sending {} -> {}", logging::pdu_summary(&get), from);
    self.send_dgram(Addrd(&bytes, from), message_id, token)
  }

  fn fetch_recvd(&mut self, pdu: Pdu, from: SocketAddr, now: Instant<P::Clock>) -> Result<(), Error<P>> {
    let mut fetch = match self.fetch.take() {
      | Some(fetch) => fetch,
      | None => return Ok(()),
    };

    if pdu.ty == Type::Ack && pdu.code == Code::EMPTY {
      self.deadlines.cancel(Key::NotificationFetch);
      self.fetch = Some(fetch);
      return Ok(());
    }

    fetch.payload.extend_from_slice(pdu.payload());

    if pdu.ty == Type::Con {
      self.send_pdu(&Pdu::ack(&pdu), from)?;
    }

    match pdu.block2() {
      | Some(block) if block.more() => {
        fetch.message_id = self.next_id();

        let request = Request::new(fetch.resource.url().clone());
        let mut get = Pdu::new(Type::Con, Code::GET, fetch.message_id, fetch.token);
        self.add_uri_options(&mut get, &request, request.host_ip().is_none());
        get.add_option(known::BLOCK2,
                       Block::new(block.num() + 1, BLOCK_SZX, false).to_bytes());

        let bytes = get.pack().map_err(|e| {
                                When::SendingMessage(Some(fetch.peer), get.id, get.token).what(What::ToBytes(e))
                              })?;

        fetch.timer = RetryTimer::new(now,
                                      self.config.msg.con.retry_strategy,
                                      self.config.msg.con.max_attempts);
        fetch.request_data = bytes.clone();
        self.deadlines.schedule(Key::NotificationFetch,
                                millis_since_epoch(fetch.timer.next_attempt_at()));

        let peer = fetch.peer;
        self.fetch = Some(fetch);

        log::trace!("sending {} -> {}", logging::pdu_summary(&get), peer);
        self.send_dgram(Addrd(&bytes, peer), get.id, get.token)
      },
      | _ => {
        self.deadlines.cancel(Key::NotificationFetch);
        log::debug!("notification {} from {} complete ({}b)",
                    fetch.sequence,
                    fetch.resource,
                    fetch.payload.len());

        self.events
            .push_back(Event::Notification { resource: fetch.resource,
                                             sequence: fetch.sequence,
                                             payload: fetch.payload,
                                             content_format: fetch.content_format });
        Ok(())
      },
    }
  }

  fn unsolicited(&mut self, pdu: Pdu, from: SocketAddr) -> Result<(), Error<P>> {
    log::debug!("unsolicited {} from {}", logging::pdu_summary(&pdu), from);

    let reset = match pdu.ty {
      | Type::Con | Type::Non => Some(Pdu::reset(&pdu)),
      | Type::Ack | Type::Reset => None,
    };

    self.events.push_back(Event::Unsolicited(Addrd(pdu, from)));

    match reset {
      | Some(reset) => self.send_pdu(&reset, from),
      | None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::net::Ipv4Addr;

  use url::Url;

  use super::*;
  use crate::test::{ClockMock, Dgrams, Platform as Mock, ResolverMock, SockMock};

  struct Harness {
    coap: Coap<Mock>,
    rx: Dgrams,
    tx: Dgrams,
  }

  fn server() -> SocketAddr {
    "127.0.0.1:5683".parse().unwrap()
  }

  fn harness() -> Harness {
    harness_resolving(ResolverMock::default())
  }

  fn harness_resolving(resolver: ResolverMock) -> Harness {
    let sock = SockMock::new();
    let (rx, tx) = (sock.rx.clone(), sock.tx.clone());

    Harness { coap: Coap::new(sock, ClockMock::new(), resolver),
              rx,
              tx }
  }

  impl Harness {
    fn at(&mut self, ms: u64) {
      self.coap.clock.set(ms);
      self.coap.tick().unwrap();
    }

    fn tick(&mut self) {
      self.coap.tick().unwrap();
    }

    fn sent(&self) -> Vec<Pdu> {
      SockMock::sent(&self.tx).into_iter()
                              .map(Addrd::unwrap)
                              .collect()
    }

    fn take_sent(&self) -> Vec<Pdu> {
      let sent = self.sent();
      self.tx.lock().unwrap().clear();
      sent
    }

    fn respond(&self, pdu: &Pdu) {
      SockMock::inject(&self.rx, pdu, server());
    }

    fn events(&mut self) -> Vec<Event> {
      core::iter::from_fn(|| self.coap.poll_event()).collect()
    }
  }

  fn req(url: &str) -> Request {
    Request::parse(url).unwrap()
  }

  fn piggyback(req: &Pdu, code: Code, payload: &[u8]) -> Pdu {
    let mut rep = Pdu::new(Type::Ack, code, req.id, req.token);
    rep.set_payload(payload.to_vec());
    rep
  }

  fn opt_strs(pdu: &Pdu, number: nymea_coap_msg::OptNumber) -> Vec<String> {
    pdu.options(number)
       .map(|o| String::from_utf8(o.value.as_bytes().to_vec()).unwrap())
       .collect()
  }

  /// Register an observation of `url` and acknowledge it, returning the registration
  fn observe(h: &mut Harness, url: &str) -> Pdu {
    let handle = h.coap.enable_notifications(req(url));
    h.at(0);

    let register = h.take_sent().remove(0);
    let mut ack = piggyback(&register, Code::CONTENT, b"20.0");
    ack.add_option(known::OBSERVE, [1u8]);
    h.respond(&ack);
    h.tick();

    assert!(h.coap.reply(&handle).unwrap().is_finished());
    h.events();
    register
  }

  #[test]
  fn retransmits_then_times_out() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/temp"));

    h.at(0);
    assert_eq!(h.sent().len(), 1);
    assert!(h.coap.reply(&handle).unwrap().is_running());

    [(1999, 1), (2000, 2), (4000, 3), (6000, 4), (8000, 5), (9999, 5)].into_iter()
                                                                       .for_each(|(at, sent)| {
                                                                         h.at(at);
                                                                         assert_eq!(h.sent().len(), sent, "at {}ms", at);
                                                                       });
    assert!(!h.coap.reply(&handle).unwrap().is_finished());
    assert_eq!(h.coap.reply(&handle).unwrap().retransmissions, 5);

    h.at(10_000);
    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert!(!reply.is_running());
    assert_eq!(reply.error(), Some(ReplyError::Timeout));

    let sent = h.sent();
    assert_eq!(sent.len(), 5);
    assert!(sent.iter().all(|pdu| pdu == &sent[0]));
    assert_eq!(h.events(), vec![Event::Finished(handle.id())]);
  }

  #[test]
  fn requests_are_sent_one_at_a_time_in_order() {
    let mut h = harness();
    let paths = ["a", "b", "c"];
    let handles = paths.iter()
                       .map(|p| h.coap.get(req(&format!("coap://127.0.0.1/{}", p))))
                       .collect::<Vec<_>>();

    h.at(0);
    paths.iter().enumerate().for_each(|(ix, path)| {
                              let sent = h.sent();
                              assert_eq!(sent.len(), ix + 1);

                              let last = sent.last().unwrap();
                              assert_eq!(opt_strs(last, known::PATH), vec![path.to_string()]);
                              assert!(!last.has_option(known::HOST));
                              assert!(!last.has_option(known::PORT));

                              h.respond(&piggyback(last, Code::CONTENT, path.as_bytes()));
                              h.tick();
                            });

    let expected = handles.iter()
                          .map(|handle| Event::Finished(handle.id()))
                          .collect::<Vec<_>>();
    assert_eq!(h.events(), expected);

    handles.into_iter().zip(paths).for_each(|(handle, path)| {
                                    let reply = h.coap.take_reply(handle).unwrap();
                                    assert_eq!(reply.status_code(), Code::CONTENT);
                                    assert_eq!(reply.payload(), path.as_bytes());
                                  });
    assert!(h.coap.exchanges.is_empty());
  }

  #[test]
  fn take_reply_hands_back_unfinished() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/temp"));
    h.at(0);

    let handle = h.coap.take_reply(handle).unwrap_err();
    assert!(h.coap.reply(&handle).is_some());
  }

  #[test]
  fn uri_options() {
    let mut h = harness();
    let _reply = h.coap.get(req("coap://127.0.0.1:5684/sensors/temp?unit=c&&precision=2"));
    h.at(0);

    let sent = SockMock::sent(&h.tx);
    let get = sent[0].data();
    assert_eq!(sent[0].addr(), "127.0.0.1:5684".parse().unwrap());
    assert_eq!(get.ty, Type::Con);
    assert_eq!(get.code, Code::GET);
    assert!((1..=7).contains(&get.token.len()));
    assert_eq!(get.option(known::PORT).unwrap().value.as_bytes(), &[0x16, 0x34]);
    assert_eq!(opt_strs(get, known::PATH), vec!["sensors", "temp"]);
    assert_eq!(opt_strs(get, known::QUERY), vec!["unit=c", "precision=2"]);
    assert_eq!(get.block2(), Some(Block::new(0, 2, false)));
    assert!(get.payload().is_empty());
  }

  #[test]
  fn blockwise_upload() {
    let mut h = harness();
    let payload = (0..200u8).collect::<Vec<_>>();
    let handle = h.coap.put(req("coap://127.0.0.1/config"), payload.clone());

    h.at(0);
    (0..4u32).for_each(|n| {
               let sent = h.sent();
               assert_eq!(sent.len(), n as usize + 1);

               let pdu = sent.last().unwrap().clone();
               let block = pdu.block1().unwrap();
               assert_eq!(block.num(), n);
               assert_eq!(block.size(), 64);
               assert_eq!(block.more(), n < 3);

               let start = n as usize * 64;
               assert_eq!(pdu.payload(), &payload[start..(start + 64).min(200)]);
               assert_eq!(pdu.token, sent[0].token);
               assert!(pdu.has_option(known::CONTENT_FORMAT));

               let code = if n < 3 { Code::CONTINUE } else { Code::CHANGED };
               let mut ack = Pdu::new(Type::Ack, code, pdu.id, pdu.token);
               ack.add_option(known::BLOCK1, block.to_bytes());
               h.respond(&ack);
               h.tick();
             });

    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert_eq!(reply.error(), None);
    assert_eq!(reply.status_code(), Code::CHANGED);
    assert_eq!(h.sent().len(), 4);
    assert_eq!(h.sent()[3].payload().len(), 8);
  }

  #[test]
  fn small_payload_is_sent_whole() {
    let mut h = harness();
    let _reply = h.coap.post(req("coap://127.0.0.1/log"), "hello");
    h.at(0);

    let post = h.take_sent().remove(0);
    assert_eq!(post.code, Code::POST);
    assert_eq!(post.payload(), b"hello");
    assert_eq!(post.block1(), None);
    assert_eq!(post.option(known::CONTENT_FORMAT).unwrap().value.as_bytes(), &[0]);
  }

  #[test]
  fn blockwise_download() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/large"));
    h.at(0);

    let first = h.take_sent().remove(0);
    let mut ack = piggyback(&first, Code::CONTENT, &[b'a'; 64]);
    ack.add_option(known::BLOCK2, Block::new(0, 2, true).to_bytes());
    h.respond(&ack);
    h.at(10);

    let second = h.take_sent().remove(0);
    assert_eq!(second.block2(), Some(Block::new(1, 2, false)));
    assert_eq!(second.token, first.token);
    assert_ne!(second.id, first.id);
    assert_eq!(opt_strs(&second, known::PATH), vec!["large"]);
    assert!(!h.coap.reply(&handle).unwrap().is_finished());

    let mut last = piggyback(&second, Code::CONTENT, &[b'b'; 10]);
    last.add_option(known::BLOCK2, Block::new(1, 2, false).to_bytes());
    h.respond(&last);
    h.at(20);

    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert_eq!(reply.payload(), [[b'a'; 64].as_ref(), [b'b'; 10].as_ref()].concat());
  }

  #[test]
  fn separate_response() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/slow"));
    h.at(0);
    let get = h.take_sent().remove(0);

    h.respond(&Pdu::new(Type::Ack, Code::EMPTY, get.id, Token::default()));
    h.at(100);
    let reply = h.coap.reply(&handle).unwrap();
    assert!(!reply.is_running());
    assert!(!reply.is_finished());

    h.at(2000);
    assert!(h.take_sent().is_empty());

    let mut response = Pdu::new(Type::Con, Code::CONTENT, Id(get.id.0.wrapping_add(1000)), get.token);
    response.set_payload(b"done".to_vec());
    h.respond(&response);
    h.at(2500);

    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert_eq!(reply.payload(), b"done");
    assert_eq!(reply.message_type(), Type::Con);

    let ack = h.take_sent().remove(0);
    assert_eq!(ack.ty, Type::Ack);
    assert_eq!(ack.code, Code::EMPTY);
    assert_eq!(ack.id, response.id);
    assert!(ack.token.is_empty());
  }

  #[test]
  fn bad_scheme_is_rejected_without_sending() {
    let mut h = harness();
    let handle = h.coap.get(req("http://127.0.0.1/temp"));

    assert_eq!(h.coap.reply(&handle).unwrap().error(),
               Some(ReplyError::InvalidUrlScheme));
    assert!(h.coap.reply(&handle).unwrap().is_finished());

    h.at(0);
    assert!(h.sent().is_empty());
    assert_eq!(h.events(), vec![Event::Finished(handle.id())]);
  }

  #[test]
  fn dropping_handles_abandons_exchanges() {
    let mut h = harness();
    let first = h.coap.get(req("coap://127.0.0.1/one"));
    let second = h.coap.get(req("coap://127.0.0.1/two"));
    let third = h.coap.get(req("coap://127.0.0.1/three"));

    h.at(0);
    assert_eq!(h.take_sent().len(), 1);

    drop(second);
    drop(first);
    h.at(1);

    let sent = h.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(opt_strs(&sent[0], known::PATH), vec!["three"]);

    // the abandoned exchange is no longer retransmitted
    h.at(2000);
    assert!(h.take_sent().is_empty());
    assert_eq!(h.coap.exchanges.len(), 1);
    assert!(h.coap.reply(&third).is_some());

    drop(third);
    h.tick();
    assert!(h.coap.exchanges.is_empty());
    assert_eq!(h.coap.next_deadline(), None);
  }

  #[test]
  fn dropping_a_finished_handle_forgets_its_event() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/temp"));
    h.at(0);

    let get = h.take_sent().remove(0);
    h.respond(&piggyback(&get, Code::CONTENT, b"1"));
    h.tick();
    assert!(h.coap.reply(&handle).unwrap().is_finished());

    drop(handle);
    h.tick();

    assert!(h.coap.exchanges.is_empty());
    assert_eq!(h.events(), vec![]);
  }

  #[test]
  fn observe_and_notify() {
    let url = "coap://127.0.0.1/obs";
    let mut h = harness();
    let handle = h.coap.enable_notifications(req(url));
    h.at(0);

    let register = h.take_sent().remove(0);
    assert!(register.option(known::OBSERVE).unwrap().value.as_bytes().is_empty());
    assert_eq!(h.coap
                .observed_resources()
                .map(|r| r.token())
                .collect::<Vec<_>>(),
               vec![register.token]);

    let mut ack = piggyback(&register, Code::CONTENT, b"20.0");
    ack.add_option(known::OBSERVE, [1u8]);
    h.respond(&ack);
    h.tick();
    assert_eq!(h.coap.take_reply(handle).unwrap().payload(), b"20.0");
    h.events();

    let mut notification = Pdu::new(Type::Con, Code::CONTENT, Id(0x4242), register.token);
    notification.add_option(known::OBSERVE, [5u8]);
    notification.set_payload(b"21.5".to_vec());
    h.respond(&notification);
    h.tick();

    let resource = ObserveResource::new(Url::parse(url).unwrap(), register.token);
    assert_eq!(h.events(),
               vec![Event::Notification { resource,
                                          sequence: 5,
                                          payload: b"21.5".to_vec(),
                                          content_format: ContentFormat::Text }]);

    let sent = h.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].code, Code::EMPTY);
    assert_eq!(sent[0].id, Id(0x4242));
  }

  #[test]
  fn non_confirmable_notification_is_acknowledged() {
    let url = "coap://127.0.0.1/obs";
    let mut h = harness();
    let register = observe(&mut h, url);

    let mut notification = Pdu::new(Type::Non, Code::CONTENT, Id(0x0909), register.token);
    notification.add_option(known::OBSERVE, [9u8]);
    notification.set_payload(b"22.0".to_vec());
    h.respond(&notification);
    h.tick();

    let resource = ObserveResource::new(Url::parse(url).unwrap(), register.token);
    assert_eq!(h.events(),
               vec![Event::Notification { resource,
                                          sequence: 9,
                                          payload: b"22.0".to_vec(),
                                          content_format: ContentFormat::Text }]);

    let sent = h.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].code, Code::EMPTY);
    assert_eq!(sent[0].id, Id(0x0909));
    assert_eq!(sent[0].token, register.token);
  }

  #[test]
  fn blockwise_notification() {
    let url = "coap://127.0.0.1/obs";
    let mut h = harness();
    let register = observe(&mut h, url);

    let mut first = Pdu::new(Type::Con, Code::CONTENT, Id(0x1111), register.token);
    first.add_option(known::OBSERVE, [7u8]);
    first.add_option(known::BLOCK2, Block::new(0, 2, true).to_bytes());
    first.set_payload(vec![b'x'; 64]);
    h.respond(&first);
    h.at(50);

    let sent = h.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].id, Id(0x1111));

    let fetch = &sent[1];
    assert_eq!(fetch.code, Code::GET);
    assert_eq!(fetch.block2(), Some(Block::new(1, 2, false)));
    assert_ne!(fetch.token, register.token);
    assert!(h.events().is_empty());

    let mut rest = piggyback(fetch, Code::CONTENT, b"tail");
    rest.add_option(known::BLOCK2, Block::new(1, 2, false).to_bytes());
    h.respond(&rest);
    h.at(60);

    let resource = ObserveResource::new(Url::parse(url).unwrap(), register.token);
    assert_eq!(h.events(),
               vec![Event::Notification { resource,
                                          sequence: 7,
                                          payload: [vec![b'x'; 64], b"tail".to_vec()].concat(),
                                          content_format: ContentFormat::Text }]);
    assert!(h.coap.fetch.is_none());
    assert_eq!(h.coap.next_deadline(), None);
  }

  #[test]
  fn disable_reuses_registration_token() {
    let url = "coap://127.0.0.1/obs";
    let mut h = harness();
    let register = observe(&mut h, url);

    let _reply = h.coap.disable_notifications(req(url));
    h.at(100);

    let deregister = h.take_sent().remove(0);
    assert_eq!(deregister.token, register.token);
    assert_eq!(deregister.option(known::OBSERVE).unwrap().value.as_bytes(), &[1]);
    assert_eq!(h.coap.observed_resources().count(), 0);
  }

  #[test]
  fn unsolicited_messages_are_reset() {
    let mut h = harness();
    let stray = Pdu::new(Type::Con, Code::CONTENT, Id(77), Token::from_slice(&[9, 9]));
    h.respond(&stray);
    h.at(0);

    let reset = h.take_sent().remove(0);
    assert_eq!(reset.ty, Type::Reset);
    assert_eq!(reset.code, Code::EMPTY);
    assert_eq!(reset.id, Id(77));
    assert_eq!(h.events(), vec![Event::Unsolicited(Addrd(stray, server()))]);

    let stray_ack = Pdu::new(Type::Ack, Code::CONTENT, Id(78), Token::from_slice(&[8]));
    h.respond(&stray_ack);
    h.tick();
    assert!(h.take_sent().is_empty());
    assert_eq!(h.events(), vec![Event::Unsolicited(Addrd(stray_ack, server()))]);
  }

  #[test]
  fn host_names_are_resolved() {
    let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let mut h = harness_resolving(ResolverMock::default().with_host("coap.me", ip));
    let handle = h.coap.get(req("coap://coap.me/test"));
    h.at(0);

    let sent = SockMock::sent(&h.tx);
    assert_eq!(sent[0].addr(), SocketAddr::new(ip, 5683));
    assert_eq!(opt_strs(sent[0].data(), known::HOST), vec!["coap.me"]);
    assert_eq!(h.coap.reply(&handle).unwrap().peer(), Some(SocketAddr::new(ip, 5683)));
  }

  #[test]
  fn slow_lookups_do_not_block_ticks() {
    let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let resolver = ResolverMock::default().with_host("coap.me", ip).pending_for(3);
    let mut h = harness_resolving(resolver);
    let handle = h.coap.get(req("coap://coap.me/test"));

    // datagrams are still handled while the lookup is pending
    let ping = Pdu::new(Type::Con, Code::EMPTY, Id(7), Token::default());
    h.respond(&ping);

    for at in 0..3 {
      h.at(at);
      assert!(!h.coap.reply(&handle).unwrap().is_running());
    }
    assert_eq!(h.coap.resolver.calls, 3);

    let reset = h.take_sent();
    assert_eq!(reset.len(), 1);
    assert_eq!(reset[0].ty, Type::Reset);

    h.at(3);
    let sent = SockMock::sent(&h.tx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].addr(), SocketAddr::new(ip, 5683));
    assert!(h.coap.reply(&handle).unwrap().is_running());
  }

  #[test]
  fn unknown_host() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://nowhere.invalid/test"));
    let next = h.coap.get(req("coap://127.0.0.1/next"));
    h.at(0);

    assert_eq!(h.coap.reply(&handle).unwrap().error(),
               Some(ReplyError::HostNotFound));
    assert_eq!(h.sent().len(), 1);
    assert!(h.coap.reply(&next).unwrap().is_running());
  }

  #[test]
  fn non_confirmable_finishes_once_sent() {
    let mut h = harness();
    let handle = h.coap
                  .get(req("coap://127.0.0.1/temp").with_message_type(Type::Non));
    h.at(0);

    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert_eq!(reply.error(), None);
    assert_eq!(h.take_sent()[0].ty, Type::Non);

    h.at(5000);
    assert!(h.sent().is_empty());
    assert_eq!(h.events(), vec![Event::Finished(handle.id())]);
  }

  #[test]
  fn ping() {
    let mut h = harness();
    let handle = h.coap.ping(req("coap://127.0.0.1"));
    h.at(0);

    let ping = h.take_sent().remove(0);
    assert_eq!(ping.ty, Type::Con);
    assert_eq!(ping.code, Code::EMPTY);
    assert!(ping.token.is_empty());
    assert!(ping.opts().is_empty());

    h.respond(&Pdu::reset(&ping));
    h.tick();

    let reply = h.coap.reply(&handle).unwrap();
    assert!(reply.is_finished());
    assert_eq!(reply.error(), None);
    assert_eq!(reply.message_type(), Type::Reset);
  }

  #[test]
  fn garbage_fails_the_active_exchange() {
    let mut h = harness();
    let handle = h.coap.get(req("coap://127.0.0.1/temp"));
    h.at(0);

    h.rx.lock().unwrap().push(Addrd(vec![0x40], server()));
    h.tick();

    assert_eq!(h.coap.reply(&handle).unwrap().error(),
               Some(ReplyError::InvalidPdu));
  }

  #[test]
  fn multicast_defaults_to_all_coap_devices() {
    let h = harness();
    let groups = h.coap.sock.groups.clone();

    h.coap.join_multicast_group(None).unwrap();
    assert_eq!(groups.lock().unwrap().as_slice(),
               &[IpAddr::V4(crate::multicast::ALL_COAP_DEVICES_IP)]);

    h.coap.leave_multicast_group(None).unwrap();
    assert!(groups.lock().unwrap().is_empty());
  }
}
