//! Low-level representation of CoAP messages.
//!
//! The most notable item in `nymea_coap_msg` is [`Pdu`];
//! one CoAP message, kept very close to the actual byte layout.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Token (if any, TKL bytes) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Options (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! ## Encoding & decoding
//! Messages are packed with [`Pdu::pack`] (or [`TryIntoBytes`]) and
//! decoded with [`TryFromBytes`].
//!
//! Callers that prefer a message that is always present and carries its own
//! validity can use [`Pdu::unpack`], which never fails and instead records
//! the first decoding error (see [`Pdu::is_valid`]).
//!
//! ```
//! use nymea_coap_msg::{known, Code, Id, Pdu, Token, TryFromBytes, Type};
//!
//! let mut pdu = Pdu::new(Type::Con, Code::GET, Id(1), Token::from_slice(&[254]));
//! pdu.add_option(known::PATH, "hello");
//!
//! let bytes = pdu.pack().unwrap();
//! let parsed = Pdu::try_from_bytes(&bytes).unwrap();
//!
//! assert_eq!(parsed, pdu);
//! ```
//!
//! ## Performance
//! This crate uses `criterion` to measure the cost of packing & unpacking against `coap_lite::Packet`
//! (see `benches/pdu.rs`).

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![deny(missing_docs)]

/// Byte cursor used while parsing
pub mod cursor;

#[doc(hidden)]
pub mod from_bytes;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use cursor::Cursor;
#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use to_bytes::{MessageToBytesError, TryIntoBytes};

/// Message structs
pub mod msg;

#[doc(inline)]
pub use msg::*;
