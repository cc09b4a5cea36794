use core::fmt;

use tinyvec::ArrayVec;
use toad_macros::rfc_7252_doc;

#[doc = rfc_7252_doc!("5.3.1")]
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Take an arbitrary-length sequence of bytes and turn it into an opaque message token
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change in the future.
  ///
  /// ```
  /// use nymea_coap_msg::Token;
  ///
  /// let my_token = Token::opaque(&[0, 1, 2]);
  /// assert_eq!(my_token.len(), 8);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }

  /// Copy at most 8 bytes from `bytes` into a token.
  ///
  /// ```
  /// use nymea_coap_msg::Token;
  ///
  /// assert_eq!(Token::from_slice(&[1, 2]).as_slice(), &[1, 2]);
  /// assert_eq!(Token::from_slice(&[0; 12]).len(), 8);
  /// ```
  pub fn from_slice(bytes: &[u8]) -> Token {
    let mut token = ArrayVec::new();
    token.extend(bytes.iter().copied().take(8));
    Token(token)
  }

  /// Shorten this token to `len` bytes (no-op if it is already shorter)
  pub fn truncated(mut self, len: usize) -> Token {
    self.0.truncate(len);
    self
  }

  /// Whether the token is zero bytes long
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Length of the token in bytes
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// The token bytes
  pub fn as_slice(&self) -> &[u8] {
    self.0.as_slice()
  }
}

impl AsRef<[u8]> for Token {
  fn as_ref(&self) -> &[u8] {
    self.as_slice()
  }
}

/// Renders the token as `0x` followed by lowercase hex
///
/// ```
/// use nymea_coap_msg::Token;
///
/// assert_eq!(Token::from_slice(&[0xab, 0x01]).to_string(), "0xab01");
/// ```
impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x")?;
    self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
  }
}
