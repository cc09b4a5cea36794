//! `nymea_coap` is a CoAP client for devices that speak
//! [RFC 7252](https://datatracker.ietf.org/doc/html/rfc7252) over UDP.
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the semantics of HTTP
//! to an environment conducive to **constrained** devices. (weak hardware, small battery capacity, etc.)
//!
//! Requests have the same verbs as HTTP (GET, POST, PUT, DELETE),
//! responses carry [status codes](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9)
//! and headers are called [Options](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10).
//!
//! ## The engine
//! [`Coap`] owns a UDP socket and runs one exchange at a time; further requests
//! wait in a FIFO queue. It never blocks: [`Coap::tick`] does whatever work is
//! ready (reading datagrams, retransmitting, sending the next request) and
//! results are pulled with [`Coap::poll_event`].
//!
//! On top of plain request/response it handles
//! - retransmission of Confirmable messages (every 2 seconds, 4 times)
//! - blockwise transfer ([RFC 7959](https://datatracker.ietf.org/doc/html/rfc7959)) in 64 byte blocks
//! - observation of resources ([RFC 7641](https://datatracker.ietf.org/doc/html/rfc7641))
//!
//! [`CoreLinkParser`] reads the resource directory a server publishes at
//! `/.well-known/core`.
//!
//! ```no_run
//! use nymea_coap::blocking::Client;
//! use nymea_coap::{CoreLinkParser, Request};
//!
//! let mut client = Client::try_new_std(0).unwrap();
//! let reply = client.get(Request::parse("coap://coap.me/.well-known/core").unwrap())
//!                   .unwrap();
//!
//! CoreLinkParser::new(reply.payload()).links()
//!                                     .iter()
//!                                     .for_each(|link| println!("{}", link));
//! ```

#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]


pub(crate) mod logging;

/// Blocking CoAP client
pub mod blocking;

/// customizable retrying of fallible operations
pub mod retry;

/// requests
pub mod req;

/// replies
pub mod reply;

/// observed resources
pub mod observe;

/// the client engine
pub mod coap;

/// CoRE Link Format
pub mod link;

/// platform configuration
pub mod platform;

/// network abstractions
pub mod net;

/// time abstractions
pub mod time;

/// configuring runtime behavior
pub mod config;

/// `std` implementations of the platform traits
pub mod std;

#[doc(inline)]
pub use coap::{Coap, Error, Event, What, When};
#[doc(inline)]
pub use link::{CoreLink, CoreLinkParser};
#[doc(inline)]
pub use observe::ObserveResource;
#[doc(inline)]
pub use reply::{Reply, ReplyError, ReplyHandle, ReplyId};
#[doc(inline)]
pub use req::{Method, Request};

/// Helper constants and functions for creating multicast addresses
pub mod multicast {
  use ::std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

  /// IPv4 "All CoAP devices" multicast address.
  ///
  /// If using multicast to discover devices, it's recommended
  /// that you use this address with a port specific to your application.
  pub const ALL_COAP_DEVICES_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 187);

  /// Create a SocketAddr (IP + port) with the [`ALL_COAP_DEVICES_IP`] address
  ///
  /// ```
  /// assert_eq!(nymea_coap::multicast::all_coap_devices(5683).to_string(),
  ///            "224.0.1.187:5683");
  /// ```
  pub const fn all_coap_devices(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(ALL_COAP_DEVICES_IP, port))
  }
}
