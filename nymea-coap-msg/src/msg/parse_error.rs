use super::opt::parse_error::OptParseError;

/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Token length was > 8
  InvalidTokenLength(u8),

  /// Version was not 1
  InvalidVersion(u8),

  /// Error parsing option
  OptParseError(OptParseError),

  /// The message type is invalid (see [`crate::Type`] for information & valid values)
  InvalidType(u8),
}

/// Coarse classification of [`MessageParseError`]s
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum PduErrorKind {
  /// The token length nibble was out of range
  InvalidToken,
  /// The message ended early or carried an unsupported header
  InvalidPduSize,
  /// An option delta used the reserved nibble or was cut short
  InvalidOptionDelta,
  /// An option length used the reserved nibble or the value was cut short
  InvalidOptionLength,
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }

  /// Classify this error
  ///
  /// ```
  /// use nymea_coap_msg::{MessageParseError, PduErrorKind};
  ///
  /// assert_eq!(MessageParseError::InvalidTokenLength(9).kind(), PduErrorKind::InvalidToken);
  /// assert_eq!(MessageParseError::eof().kind(), PduErrorKind::InvalidPduSize);
  /// ```
  pub fn kind(&self) -> PduErrorKind {
    match self {
      | Self::InvalidTokenLength(_) => PduErrorKind::InvalidToken,
      | Self::UnexpectedEndOfStream | Self::InvalidVersion(_) | Self::InvalidType(_) => {
        PduErrorKind::InvalidPduSize
      },
      | Self::OptParseError(OptParseError::OptionDeltaReservedValue(_)) => {
        PduErrorKind::InvalidOptionDelta
      },
      | Self::OptParseError(_) => PduErrorKind::InvalidOptionLength,
    }
  }
}

impl From<OptParseError> for MessageParseError {
  fn from(e: OptParseError) -> Self {
    Self::OptParseError(e)
  }
}
