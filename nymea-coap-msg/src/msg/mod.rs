use core::fmt;

use toad_macros::rfc_7252_doc;

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use crate::from_bytes::TryConsumeBytes;
use crate::{Cursor, MessageToBytesError, TryFromBytes};

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

/// # `Pdu` struct
/// One CoAP message (protocol data unit).
///
/// Options are kept sorted by option number, which is what makes
/// delta-encoding them possible. The only way to add an option is
/// [`Pdu::add_option`], which keeps that order and remembers the
/// Content-Format and Block1 / Block2 options as they are added.
///
/// <details>
/// <summary><b>RFC7252 - CoAP Messaging Model</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("2.1"))]
/// </details>
/// <details>
/// <summary><b>RFC7252 - CoAP Message Binary Format</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("3"))]
/// </details>
///
/// ```
/// use nymea_coap_msg::known::{Block, ContentFormat};
/// use nymea_coap_msg::{known, Code, Id, Pdu, Token, Type};
///
/// let mut pdu = Pdu::new(Type::Con, Code::PUT, Id(7), Token::from_slice(&[1, 2]));
/// pdu.add_option(known::BLOCK1, Block::new(0, 2, true).to_bytes());
/// pdu.add_option(known::PATH, "config");
/// pdu.add_option(known::CONTENT_FORMAT, ContentFormat::Json.bytes());
/// pdu.set_payload(br#"{"on":true}"#.to_vec());
///
/// let numbers = pdu.opts().iter().map(|o| o.number.0).collect::<Vec<_>>();
/// assert_eq!(numbers, vec![11, 12, 27]);
/// assert_eq!(pdu.content_format(), ContentFormat::Json);
/// assert_eq!(pdu.block1(), Some(Block::new(0, 2, true)));
///
/// let unpacked = Pdu::unpack(pdu.pack().unwrap());
/// assert!(unpacked.is_valid());
/// assert_eq!(unpacked, pdu);
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Pdu {
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Token`] for details
  pub token: Token,
  opts: Vec<Opt>,
  payload: Vec<u8>,
  content_format: known::ContentFormat,
  block1: Option<known::Block>,
  block2: Option<known::Block>,
  error: Option<MessageParseError>,
}

impl Default for Pdu {
  fn default() -> Self {
    Pdu::new(Type::Con, Code::EMPTY, Id(0), Token::default())
  }
}

impl Pdu {
  /// Create a message without options or payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Pdu { ver: Version::default(),
          ty,
          code,
          id,
          token,
          opts: Vec::new(),
          payload: Vec::new(),
          content_format: known::ContentFormat::Text,
          block1: None,
          block2: None,
          error: None }
  }

  /// Create an empty message that ACKs `other`, using its id and token.
  ///
  /// ```
  /// use nymea_coap_msg::{Code, Id, Pdu, Token, Type};
  ///
  /// let notification = Pdu::new(Type::Con, Code::CONTENT, Id(9), Token::from_slice(&[3]));
  /// let ack = Pdu::ack(&notification);
  ///
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.code, Code::EMPTY);
  /// assert_eq!(ack.id, Id(9));
  /// assert_eq!(ack.token, notification.token);
  /// ```
  pub fn ack(other: &Pdu) -> Self {
    Pdu::new(Type::Ack, Code::EMPTY, other.id, other.token)
  }

  /// Create an empty message that rejects `other`, using its id and token.
  pub fn reset(other: &Pdu) -> Self {
    Pdu::new(Type::Reset, Code::EMPTY, other.id, other.token)
  }

  /// Add an option, after any options already present with the same number.
  pub fn add_option(&mut self, number: OptNumber, value: impl AsRef<[u8]>) {
    let value = value.as_ref();

    match number {
      | known::CONTENT_FORMAT => {
        self.content_format = known::ContentFormat::from_bytes(value)
      },
      | known::BLOCK1 => self.block1 = Some(known::Block::from_bytes(value)),
      | known::BLOCK2 => self.block2 = Some(known::Block::from_bytes(value)),
      | _ => (),
    }

    let ix = self.opts.partition_point(|o| o.number <= number);
    self.opts.insert(ix, Opt::new(number, value));
  }

  /// The first option with this number
  pub fn option(&self, number: OptNumber) -> Option<&Opt> {
    self.opts.iter().find(|o| o.number == number)
  }

  /// Every option with this number, in insertion order
  pub fn options(&self, number: OptNumber) -> impl Iterator<Item = &Opt> {
    self.opts.iter().filter(move |o| o.number == number)
  }

  /// Whether an option with this number is present
  pub fn has_option(&self, number: OptNumber) -> bool {
    self.option(number).is_some()
  }

  /// All options, sorted by number
  pub fn opts(&self) -> &[Opt] {
    &self.opts
  }

  /// Content-Format of the payload ([`known::ContentFormat::Text`] when absent)
  pub fn content_format(&self) -> known::ContentFormat {
    self.content_format
  }

  /// The Block1 option, if present
  pub fn block1(&self) -> Option<known::Block> {
    self.block1
  }

  /// The Block2 option, if present
  pub fn block2(&self) -> Option<known::Block> {
    self.block2
  }

  /// Sequence number carried by the Observe option, if present
  pub fn observe_sequence(&self) -> Option<u32> {
    self.option(known::OBSERVE)
        .map(|o| known::observe::sequence(o.value.as_bytes()))
  }

  /// Replace the payload
  pub fn set_payload(&mut self, payload: Vec<u8>) {
    self.payload = payload;
  }

  /// The payload
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }

  /// Whether the message was parsed without errors
  pub fn is_valid(&self) -> bool {
    self.error.is_none()
  }

  /// The error encountered while parsing, if any
  pub fn error(&self) -> Option<MessageParseError> {
    self.error
  }

  /// Serialize this message
  pub fn pack(&self) -> Result<Vec<u8>, MessageToBytesError> {
    let opts_size: usize = self.opts
                               .iter()
                               .scan(OptNumber(0), |prev, o| {
                                 let size = o.wire_size(*prev);
                                 *prev = o.number;
                                 Some(size)
                               })
                               .sum();
    let payload_size = if self.payload.is_empty() {
      0
    } else {
      self.payload.len() + 1
    };

    let mut bytes = Vec::with_capacity(4 + self.token.len() + opts_size + payload_size);

    let byte1 = Byte1 { ver: self.ver,
                        ty: self.ty,
                        tkl: self.token.len() as u8 };
    bytes.push(byte1.into());
    bytes.push(self.code.into());
    bytes.extend(<[u8; 2]>::from(self.id));
    bytes.extend(self.token.as_slice());

    let mut prev = OptNumber(0);
    for opt in &self.opts {
      opt.extend_bytes(prev, &mut bytes)?;
      prev = opt.number;
    }

    if !self.payload.is_empty() {
      bytes.push(0b1111_1111);
      bytes.extend(&self.payload);
    }

    Ok(bytes)
  }

  /// Parse a message without failing.
  ///
  /// If the bytes are not a valid message, the returned `Pdu` holds whatever
  /// was parsed before the failure, and [`Pdu::is_valid`] is `false`.
  ///
  /// ```
  /// use nymea_coap_msg::{Pdu, PduErrorKind};
  ///
  /// let pdu = Pdu::unpack([0b01_00_1001u8, 0x45, 0, 1]);
  /// assert!(!pdu.is_valid());
  /// assert_eq!(pdu.error().map(|e| e.kind()), Some(PduErrorKind::InvalidToken));
  /// ```
  pub fn unpack(bytes: impl AsRef<[u8]>) -> Self {
    let mut pdu = Pdu::default();
    if let Err(e) = pdu.parse(&mut Cursor::new(bytes)) {
      pdu.error = Some(e);
    }
    pdu
  }

  fn parse<A: AsRef<[u8]>>(&mut self, bytes: &mut Cursor<A>) -> Result<(), MessageParseError> {
    let byte1 = bytes.next().ok_or_else(MessageParseError::eof)?;
    let byte1 = Byte1::try_from(byte1)?;
    self.ver = byte1.ver;
    self.ty = byte1.ty;

    let code = bytes.next().ok_or_else(MessageParseError::eof)?;
    self.code = Code::from(code);
    self.id = Id::try_consume_bytes(bytes)?;

    if byte1.ver != Version(1) {
      return Err(MessageParseError::InvalidVersion(byte1.ver.0));
    }

    if byte1.tkl > 8 {
      return Err(MessageParseError::InvalidTokenLength(byte1.tkl));
    }

    let token = bytes.take_exact(byte1.tkl as usize)
                     .ok_or_else(MessageParseError::eof)?;
    self.token = Token::from_slice(token);

    Vec::<Opt>::try_consume_bytes(bytes)?.into_iter()
                                         .for_each(|o| self.add_option(o.number, o.value));

    self.payload = bytes.take_until_end().to_vec();

    Ok(())
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Pdu {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut pdu = Pdu::default();
    pdu.parse(&mut Cursor::new(bytes))?;
    Ok(pdu)
  }
}

impl fmt::Display for Pdu {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "CoAP PDU: {}", self.code)?;
    writeln!(f, "  type: {}", self.ty.name())?;
    writeln!(f, "  version: {}", self.ver.0)?;
    writeln!(f, "  token: {} (length {})", self.token, self.token.len())?;
    writeln!(f, "  message id: {}", self.id)?;
    writeln!(f, "  payload size: {}", self.payload.len())?;

    if let Some(e) = self.error {
      writeln!(f, "  error: {:?}", e)?;
    }

    self.opts.iter().try_for_each(|o| writeln!(f, "  {}", o))
  }
}
