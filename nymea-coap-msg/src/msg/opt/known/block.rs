use core::fmt;

use tinyvec::ArrayVec;

/// Three items of information may need to be transferred in a
/// Block (Block1 or Block2) option:
/// * the size of the block ([`Block::size`])
/// * whether more blocks are following ([`Block::more`])
/// * the relative number of the block ([`Block::num`]) within a sequence of blocks with the given size.
///
/// On the wire a block is an unsigned integer of 0 to 3 bytes:
///
/// ```text
///  0
///  0 1 2 3 4 5 6 7
/// +-+-+-+-+-+-+-+-+
/// |  NUM  |M| SZX |
/// +-+-+-+-+-+-+-+-+
///
///  0                   1
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          NUM          |M| SZX |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Block {
  num: u32,
  szx: u8,
  more: bool,
}

impl Block {
  /// Create a block descriptor
  ///
  /// `szx` is the size exponent (`size = 2^(szx + 4)`) and is clamped to 6;
  /// `num` is truncated to 20 bits.
  ///
  /// ```
  /// use nymea_coap_msg::known::Block;
  ///
  /// let b = Block::new(5, 2, true);
  /// assert_eq!(b.num(), 5);
  /// assert_eq!(b.size(), 64);
  /// assert!(b.more());
  /// ```
  pub fn new(num: u32, szx: u8, more: bool) -> Self {
    Self { num: num & 0x000F_FFFF,
           szx: szx.min(6),
           more }
  }

  /// Decode a block from its option value.
  ///
  /// Values longer than 3 bytes only use their first 3 bytes.
  pub fn from_bytes(bytes: &[u8]) -> Self {
    let n = bytes.iter()
                 .take(3)
                 .fold(0u32, |n, b| (n << 8) | u32::from(*b));
    Self::from(n)
  }

  /// Encode this block as the shortest option value able to hold its number
  ///
  /// ```
  /// use nymea_coap_msg::known::Block;
  ///
  /// assert_eq!(Block::new(5, 2, true).to_bytes().as_slice(), &[0x5a]);
  /// assert_eq!(Block::new(16, 2, false).to_bytes().as_slice(), &[0x01, 0x02]);
  /// assert_eq!(Block::new(4096, 2, false).to_bytes().as_slice(), &[0x01, 0x00, 0x02]);
  /// ```
  pub fn to_bytes(&self) -> ArrayVec<[u8; 3]> {
    let n = u32::from(*self).to_be_bytes();
    let len = match self.num {
      | num if num < 16 => 1,
      | num if num < 4096 => 2,
      | _ => 3,
    };

    let mut bytes = ArrayVec::new();
    bytes.extend(n[4 - len..].iter().copied());
    bytes
  }

  /// Size of the block in bytes
  pub fn size(&self) -> u16 {
    2u16.pow(u32::from(self.szx) + 4)
  }

  /// Size exponent
  pub fn szx(&self) -> u8 {
    self.szx
  }

  /// Whether more blocks follow this one
  pub fn more(&self) -> bool {
    self.more
  }

  /// Block number
  pub fn num(&self) -> u32 {
    self.num
  }

  /// Byte offset of this block within the whole body
  pub fn offset(&self) -> usize {
    self.num as usize * self.size() as usize
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    (b.num << 4) | (u32::from(b.more) << 3) | u32::from(b.szx)
  }
}

impl From<u32> for Block {
  fn from(n: u32) -> Self {
    // SZX 7 is reserved
    Block { num: (n >> 4) & 0x000F_FFFF,
            more: (n & 0b1000) >> 3 == 1,
            szx: (n & 0b111).min(6) as u8 }
  }
}

impl fmt::Display for Block {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f,
           "block {} (size {}{})",
           self.num,
           self.size(),
           if self.more { ", more" } else { "" })
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block() {
    let b = Block::from(33);
    assert_eq!(b.size(), 32);
    assert_eq!(b.num(), 2);
    assert_eq!(b.more(), false);

    let b = Block::from(59);
    assert_eq!(b.size(), 128);
    assert_eq!(b.num(), 3);
    assert_eq!(b.more(), true);

    assert_eq!(u32::from(Block::new(2, 1, false)), 33);
    assert_eq!(u32::from(Block::new(3, 3, true)), 59);
  }

  #[test]
  fn reserved_szx_clamps_to_1024() {
    assert_eq!(Block::from(0b0111).size(), 1024);
    assert_eq!(Block::new(0, 7, false).size(), 1024);
  }

  #[test]
  fn encoding_is_lossless() {
    [0u32, 5, 15, 16, 17, 255, 4095, 4096, 70_000, 0x000F_FFFF].into_iter()
                                                                 .for_each(|num| {
                                                                   [true, false].into_iter().for_each(|more| {
                                                                     let b = Block::new(num, 2, more);
                                                                     let decoded = Block::from_bytes(&b.to_bytes());
                                                                     assert_eq!(decoded, b, "num {}", num);
                                                                   })
                                                                 });
  }

  #[test]
  fn empty_value_is_block_zero() {
    let b = Block::from_bytes(&[]);
    assert_eq!(b.num(), 0);
    assert_eq!(b.size(), 16);
    assert!(!b.more());
  }

  #[test]
  fn offset() {
    assert_eq!(Block::new(3, 2, false).offset(), 192);
  }
}
