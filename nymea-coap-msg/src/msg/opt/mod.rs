use core::fmt;

use toad_macros::rfc_7252_doc;

use crate::from_bytes::TryConsumeBytes;
use crate::to_bytes::{opt_len_or_delta, MAX_OPT_LEN_OR_DELTA};
use crate::{Cursor, MessageToBytesError};

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Well-known options
pub mod known;

/// Decode the delta or value length nibble of an option header,
/// consuming its extended bytes if there are any.
pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u32, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok(u32::from(n) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u32::from(u16::from_be_bytes([a, b])) + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(u32::from(head)),
  }
}

#[doc = rfc_7252_doc!("5.4")]
/// <details><summary><b>RFC7252 Section 3.1 Option binary format</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("3.1"))]
/// </details>
///
/// # `Opt` struct
/// One option of a message, with its absolute [`OptNumber`].
///
/// The delta between consecutive option numbers only exists on the wire;
/// it is computed while packing ([`Opt::extend_bytes`]) and accumulated while parsing.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Opt {
  /// See [`OptNumber`]
  pub number: OptNumber,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Create an option
  pub fn new(number: OptNumber, value: impl AsRef<[u8]>) -> Self {
    Self { number,
           value: OptValue(value.as_ref().to_vec()) }
  }

  /// Write this option's wire representation, given the number of the option
  /// written immediately before it (`OptNumber(0)` for the first option).
  pub fn extend_bytes(&self,
                      prev: OptNumber,
                      bytes: &mut impl Extend<u8>)
                      -> Result<(), MessageToBytesError> {
    let delta = self.number.0.saturating_sub(prev.0);
    if delta > MAX_OPT_LEN_OR_DELTA {
      return Err(MessageToBytesError::OptionDeltaTooLarge { number: self.number.0,
                                                            delta });
    }

    let size = self.value.0.len();
    if size > MAX_OPT_LEN_OR_DELTA as usize {
      return Err(MessageToBytesError::OptionValueTooLong { number: self.number.0,
                                                           size });
    }

    let (del, del_bytes) = opt_len_or_delta(delta);
    let (len, len_bytes) = opt_len_or_delta(size as u32);
    let header = (del << 4) | len;

    bytes.extend(Some(header));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());

    Ok(())
  }

  /// Number of bytes this option occupies on the wire
  pub fn wire_size(&self, prev: OptNumber) -> usize {
    let ext = |n: u32| match n {
      | n if n >= 269 => 2,
      | n if n >= 13 => 1,
      | _ => 0,
    };

    1 + ext(self.number.0.saturating_sub(prev.0)) + ext(self.value.0.len() as u32) + self.value.0.len()
  }
}

/// Renders an option as `Name: value`, interpreting the value by option kind
///
/// ```
/// use nymea_coap_msg::{known, Opt};
///
/// assert_eq!(Opt::new(known::PATH, "temp").to_string(), "UriPath: temp");
/// assert_eq!(Opt::new(known::BLOCK2, [0x5au8]).to_string(), "Block2: block 5 (size 64, more)");
/// assert_eq!(Opt::new(known::PORT, [0x16u8, 0x34]).to_string(), "UriPort: 5684");
/// ```
impl fmt::Display for Opt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use known::*;

    match known::name(self.number) {
      | Some(name) => write!(f, "{}: ", name)?,
      | None => write!(f, "Option({}): ", self.number.0)?,
    }

    let bytes = self.value.as_bytes();
    match self.number {
      | HOST | PATH | QUERY | LOCATION_PATH | LOCATION_QUERY | PROXY_URI | PROXY_SCHEME => {
        write!(f, "{}", String::from_utf8_lossy(bytes))
      },
      | BLOCK1 | BLOCK2 => write!(f, "{}", Block::from_bytes(bytes)),
      | CONTENT_FORMAT | ACCEPT => write!(f, "{}", ContentFormat::from_bytes(bytes)),
      | OBSERVE | PORT | MAX_AGE | SIZE1 => write!(f, "{}", observe::uint(bytes)),
      | _ => {
        write!(f, "0x")?;
        bytes.iter().try_for_each(|b| write!(f, "{:02x}", b))
      },
    }
  }
}

/// The delta between an option's number and the number of the option preceding it
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptDelta(pub u32);

#[doc = rfc_7252_doc!("5.4.6")]
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl OptNumber {
  /// Critical options must be understood by the recipient (odd option numbers)
  ///
  /// ```
  /// use nymea_coap_msg::known;
  ///
  /// assert!(known::PATH.is_critical());
  /// assert!(!known::CONTENT_FORMAT.is_critical());
  /// ```
  pub fn is_critical(&self) -> bool {
    self.0 & 1 == 1
  }
}

#[doc = rfc_7252_doc!("3.2")]
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Borrow the value bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

impl AsRef<[u8]> for OptValue {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

/// One option header + value, before its number is known
#[derive(Debug)]
pub(crate) struct RawOpt {
  pub(crate) delta: OptDelta,
  pub(crate) value: OptValue,
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Option<RawOpt> {
  type Error = OptParseError;

  /// Yields `None` once the payload marker (consumed) or the end of the buffer is reached
  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let byte1 = match bytes.next() {
      | None | Some(0b1111_1111) => return Ok(None),
      | Some(b) => b,
    };

    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;

    let len = parse_opt_len_or_delta(byte1 & 0b0000_1111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))?
              as usize;

    let value = bytes.take_exact(len).ok_or_else(OptParseError::eof)?;

    Ok(Some(RawOpt { delta: OptDelta(delta),
                     value: OptValue(value.to_vec()) }))
  }
}

/// Parses every option up to the payload marker, accumulating deltas into option numbers.
impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Vec<Opt> {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Vec::new();
    let mut number = 0u32;

    while let Some(RawOpt { delta, value }) = Option::<RawOpt>::try_consume_bytes(bytes)? {
      number = number.saturating_add(delta.0);
      opts.push(Opt { number: OptNumber(number),
                      value });
    }

    Ok(opts)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_opt() {
    let opt_bytes: [u8; 2] = [0b0000_0001, 0b0000_0001];
    let opt = Option::<RawOpt>::try_consume_bytes(&mut Cursor::new(opt_bytes)).unwrap()
                                                                               .unwrap();
    assert_eq!(opt.delta, OptDelta(0));
    assert_eq!(opt.value, OptValue(vec![1]));

    let opt_bytes: [u8; 5] = [0b0001_0001, 0b0000_0011, 0b0000_0001, 0b0000_0001, 0b0000_0001];
    let opt = Option::<RawOpt>::try_consume_bytes(&mut Cursor::new(opt_bytes)).unwrap()
                                                                               .unwrap();
    assert_eq!(opt.delta, OptDelta(1));
    assert_eq!(opt.value, OptValue(vec![3]));

    let opt_bytes: [u8; 3] = [0b1101_0001, 11, 9];
    let opt = Option::<RawOpt>::try_consume_bytes(&mut Cursor::new(opt_bytes)).unwrap()
                                                                               .unwrap();
    assert_eq!(opt.delta, OptDelta(24));
    assert_eq!(opt.value, OptValue(vec![9]));

    let opt_bytes: [u8; 4] = [0b1110_0000, 0xff, 0xff, 0];
    let opt = Option::<RawOpt>::try_consume_bytes(&mut Cursor::new(opt_bytes)).unwrap()
                                                                               .unwrap();
    assert_eq!(opt.delta, OptDelta(u32::from(u16::MAX) + 269));
  }

  #[test]
  fn deltas_accumulate() {
    // Uri-Host "a", Uri-Path "b", Uri-Path "c", Uri-Query "d"
    let bytes = [0x31, b'a', 0x81, b'b', 0x01, b'c', 0x41, b'd'];
    let opts = Vec::<Opt>::try_consume_bytes(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(opts,
               vec![Opt::new(known::HOST, "a"),
                    Opt::new(known::PATH, "b"),
                    Opt::new(known::PATH, "c"),
                    Opt::new(known::QUERY, "d")]);
  }

  #[test]
  fn stops_at_payload_marker() {
    let mut cur = Cursor::new([0xb1, b'x', 0xff, 1, 2]);
    let opts = Vec::<Opt>::try_consume_bytes(&mut cur).unwrap();

    assert_eq!(opts, vec![Opt::new(known::PATH, "x")]);
    assert_eq!(cur.until_end(), &[1, 2]);
  }

  #[test]
  fn reserved_nibbles() {
    assert_eq!(Option::<RawOpt>::try_consume_bytes(&mut Cursor::new([0xf0u8])).unwrap_err(),
               OptParseError::OptionDeltaReservedValue(15));
    assert_eq!(Option::<RawOpt>::try_consume_bytes(&mut Cursor::new([0x1fu8])).unwrap_err(),
               OptParseError::ValueLengthReservedValue(15));
  }

  #[test]
  fn value_cut_short() {
    assert_eq!(Option::<RawOpt>::try_consume_bytes(&mut Cursor::new([0xb3u8, 1])).unwrap_err(),
               OptParseError::UnexpectedEndOfStream);
    assert_eq!(Option::<RawOpt>::try_consume_bytes(&mut Cursor::new([0xd0u8])).unwrap_err(),
               OptParseError::UnexpectedEndOfStream);
  }

  #[test]
  fn wire_size_matches_encoding() {
    [Opt::new(known::PATH, "x"),
     Opt::new(known::SIZE1, vec![0u8; 20]),
     Opt::new(OptNumber(1000), vec![0u8; 400])].iter()
                                               .for_each(|opt| {
                                                 let mut bytes = Vec::new();
                                                 opt.extend_bytes(OptNumber(0), &mut bytes).unwrap();
                                                 assert_eq!(bytes.len(), opt.wire_size(OptNumber(0)));
                                               });
  }
}
