/// Reads a byte buffer front to back, the way every decoder in this crate consumes a datagram
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor<T> {
  bytes: T,
  pos: usize,
}

impl<T: AsRef<[u8]>> Cursor<T> {
  /// Start reading at the first byte of `bytes`
  pub fn new(bytes: T) -> Cursor<T> {
    Cursor { bytes, pos: 0 }
  }

  /// Give the buffer back
  pub fn into_inner(self) -> T {
    self.bytes
  }

  fn remaining(&self) -> usize {
    self.bytes.as_ref().len().saturating_sub(self.pos)
  }

  /// The next byte, `None` once the buffer is used up
  pub fn next(&mut self) -> Option<u8> {
    let byte = self.bytes.as_ref().get(self.pos).copied()?;
    self.pos += 1;
    Some(byte)
  }

  /// Up to `n` bytes; fewer when the buffer ends first
  pub fn take(&mut self, n: usize) -> &[u8] {
    let n = n.min(self.remaining());
    let start = self.pos;
    self.pos += n;
    &self.bytes.as_ref()[start..start + n]
  }

  /// Exactly `n` bytes, or `None` (consuming nothing) when fewer are left
  pub fn take_exact(&mut self, n: usize) -> Option<&[u8]> {
    if n > self.remaining() {
      return None;
    }

    Some(self.take(n))
  }

  /// Like [`Cursor::take`], without moving
  pub fn peek(&self, n: usize) -> &[u8] {
    let n = n.min(self.remaining());
    &self.bytes.as_ref()[self.pos..self.pos + n]
  }

  /// Like [`Cursor::take_exact`], without moving
  pub fn peek_exact(&self, n: usize) -> Option<&[u8]> {
    match n > self.remaining() {
      | true => None,
      | false => Some(self.peek(n)),
    }
  }

  /// Every byte not read yet, consuming them
  pub fn take_until_end(&mut self) -> &[u8] {
    let start = self.pos.min(self.bytes.as_ref().len());
    self.pos = self.bytes.as_ref().len();
    &self.bytes.as_ref()[start..]
  }

  /// Whether nothing is left to read
  pub fn is_exhausted(&self) -> bool {
    self.remaining() == 0
  }

  /// Every byte not read yet
  pub fn until_end(&self) -> &[u8] {
    self.peek(self.remaining())
  }

  /// How many bytes have been read
  pub fn position(&self) -> usize {
    self.pos
  }
}
