use core::fmt;

use tinyvec::ArrayVec;

/// Content-Format
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8`
  Text,
  /// `application/link-format`
  LinkFormat,
  /// `application/xml`
  Xml,
  /// `application/octet-stream`
  OctetStream,
  /// `application/exi`
  Exi,
  /// `application/json`
  Json,
  /// Another content format
  Other(u16),
}

impl Default for ContentFormat {
  fn default() -> Self {
    ContentFormat::Text
  }
}

impl ContentFormat {
  /// Convert this content format to the CoAP option value
  ///
  /// Values below 256 are written as a single byte.
  ///
  /// ```
  /// use nymea_coap_msg::known::ContentFormat;
  ///
  /// assert_eq!(ContentFormat::Text.bytes().as_slice(), &[0]);
  /// assert_eq!(ContentFormat::Json.bytes().as_slice(), &[50]);
  /// assert_eq!(ContentFormat::Other(1542).bytes().as_slice(), &[0x06, 0x06]);
  /// ```
  pub fn bytes(&self) -> ArrayVec<[u8; 2]> {
    let n = u16::from(self);
    let mut bytes = ArrayVec::new();
    match u8::try_from(n) {
      | Ok(b) => bytes.push(b),
      | Err(_) => bytes.extend(n.to_be_bytes()),
    }
    bytes
  }

  /// Decode an option value. An empty value means [`ContentFormat::Text`].
  pub fn from_bytes(bytes: &[u8]) -> Self {
    let n = bytes.iter()
                 .take(2)
                 .fold(0u16, |n, b| (n << 8) | u16::from(*b));
    Self::from(n)
  }

  /// The media type string
  pub fn media_type(&self) -> &'static str {
    use ContentFormat::*;
    match self {
      | Text => "text/plain",
      | LinkFormat => "application/link-format",
      | Xml => "application/xml",
      | OctetStream => "application/octet-stream",
      | Exi => "application/exi",
      | Json => "application/json",
      | Other(_) => "unknown",
    }
  }
}

impl<'a> From<&'a ContentFormat> for u16 {
  fn from(f: &'a ContentFormat) -> Self {
    use ContentFormat::*;
    match *f {
      | Text => 0,
      | LinkFormat => 40,
      | Xml => 41,
      | OctetStream => 42,
      | Exi => 47,
      | Json => 50,
      | Other(n) => n,
    }
  }
}

impl From<u16> for ContentFormat {
  fn from(n: u16) -> Self {
    use ContentFormat::*;
    match n {
      | 0 => Text,
      | 40 => LinkFormat,
      | 41 => Xml,
      | 42 => OctetStream,
      | 47 => Exi,
      | 50 => Json,
      | n => Other(n),
    }
  }
}

impl fmt::Display for ContentFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | ContentFormat::Other(n) => write!(f, "{}", n),
      | known => write!(f, "{}", known.media_type()),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn decode() {
    assert_eq!(ContentFormat::from_bytes(&[]), ContentFormat::Text);
    assert_eq!(ContentFormat::from_bytes(&[40]), ContentFormat::LinkFormat);
    assert_eq!(ContentFormat::from_bytes(&[0x06, 0x06]), ContentFormat::Other(1542));
  }

  #[test]
  fn display() {
    assert_eq!(ContentFormat::Json.to_string(), "application/json");
    assert_eq!(ContentFormat::Other(60).to_string(), "60");
  }
}
