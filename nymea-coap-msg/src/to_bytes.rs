use tinyvec::ArrayVec;

use crate::*;

/// Largest value representable by an option delta or option length
/// (16-bit extension + 269)
pub(crate) const MAX_OPT_LEN_OR_DELTA: u32 = u16::MAX as u32 + 269;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use nymea_coap_msg::{Code, Id, Pdu, Token, TryIntoBytes, Type};
  ///
  /// let ping = Pdu::new(Type::Con, Code::EMPTY, Id(0x1234), Token::default());
  /// let bytes: Vec<u8> = ping.try_into_bytes().unwrap();
  ///
  /// assert_eq!(bytes, vec![0b01_00_0000, 0, 0x12, 0x34]);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// An option value was longer than the 16-bit length extension can express
  OptionValueTooLong {
    /// number of the offending option
    number: u32,
    /// length of its value
    size: usize,
  },
  /// The gap between two consecutive option numbers was larger than
  /// the 16-bit delta extension can express
  OptionDeltaTooLarge {
    /// number of the offending option
    number: u32,
    /// distance to the previous option
    delta: u32,
  },
}

impl TryIntoBytes for Pdu {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    self.pack()
  }
}

/// Encode an option delta or option value length as the 4-bit
/// nibble stored in the option header + the extended bytes that follow it.
///
/// ```text
/// value          nibble  extended
/// 0..=12         value   -
/// 13..=268       13      value - 13 (1 byte)
/// 269..=65804    14      value - 269 (2 bytes, big-endian)
/// ```
pub(crate) fn opt_len_or_delta(val: u32) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend(((n - 269) as u16).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n - 13) as u8);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

impl From<Id> for [u8; 2] {
  fn from(id: Id) -> [u8; 2] {
    id.0.to_be_bytes()
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    use Type::*;
    match t {
      | Con => 0,
      | Non => 1,
      | Ack => 2,
      | Reset => 3,
    }
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::test_msg;
  use crate::{assert_eqb, assert_eqb_iter};

  #[test]
  fn msg() {
    let (msg, expected) = test_msg();
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eqb_iter!(actual, expected);
  }

  #[test]
  fn byte_1() {
    let byte = Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 };
    let actual: u8 = byte.into();
    let expected = 0b_01_10_0011u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn code() {
    let code = Code { class: 2,
                      detail: 5 };
    let actual: u8 = code.into();
    let expected = 0b0100_0101_u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn id() {
    let id = Id(16);
    let actual = u16::from_be_bytes(id.into());
    assert_eqb!(actual, 16)
  }

  #[test]
  fn nibble_thresholds() {
    assert_eq!(opt_len_or_delta(12), (12, None));

    let (nib, ext) = opt_len_or_delta(13);
    assert_eq!(nib, 13);
    assert_eq!(ext.unwrap().as_slice(), &[0]);

    let (nib, ext) = opt_len_or_delta(268);
    assert_eq!(nib, 13);
    assert_eq!(ext.unwrap().as_slice(), &[255]);

    let (nib, ext) = opt_len_or_delta(269);
    assert_eq!(nib, 14);
    assert_eq!(ext.unwrap().as_slice(), &[0, 0]);

    let (nib, ext) = opt_len_or_delta(300);
    assert_eq!(nib, 14);
    assert_eq!(ext.unwrap().as_slice(), &(300u16 - 269).to_be_bytes());
  }

  #[test]
  fn opt() {
    use core::iter::repeat;

    let cases: [(u32, Vec<u8>, Vec<u8>); 4] =
      [(24,
        repeat(1).take(100).collect(),
        [[0b1101_1101u8, 24 - 13, 100 - 13].as_ref(), repeat(1).take(100).collect::<Vec<u8>>().as_ref()].concat()),
       (1, vec![1], vec![0b0001_0001, 1]),
       (24, vec![1], vec![0b1101_0001, 11, 1]),
       (24,
        repeat(1).take(300).collect(),
        [[0b1101_1110, 24 - 13].as_ref(),
         (300u16 - 269).to_be_bytes().as_ref(),
         repeat(1).take(300).collect::<Vec<u8>>().as_ref()].concat())];

    cases.into_iter().for_each(|(number, value, expected)| {
                       let opt = Opt { number: OptNumber(number),
                                       value: OptValue(value) };
                       let mut actual = Vec::<u8>::new();
                       opt.extend_bytes(OptNumber(0), &mut actual).unwrap();
                       assert_eqb_iter!(actual, expected)
                     });
  }

  #[test]
  fn no_payload_marker() {
    let msg = Pdu::new(Type::Con, Code::new(2, 5), Id(0), Token::default());

    assert_ne!(msg.pack().unwrap().last(), Some(&0b11111111));
  }

  #[test]
  fn value_too_long() {
    let mut msg = Pdu::new(Type::Con, Code::GET, Id(0), Token::default());
    msg.add_option(known::PATH, vec![0u8; MAX_OPT_LEN_OR_DELTA as usize + 1]);

    assert_eq!(msg.pack(),
               Err(MessageToBytesError::OptionValueTooLong { number: 11,
                                                             size: MAX_OPT_LEN_OR_DELTA as usize
                                                                   + 1 }));
  }
}
