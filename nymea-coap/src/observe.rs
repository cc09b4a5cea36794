use core::fmt;

use nymea_coap_msg::Token;
use url::Url;

/// An observed resource: the URL that was registered and
/// the token the server tags its notifications with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObserveResource {
  url: Url,
  token: Token,
}

impl ObserveResource {
  /// Create a new observed resource
  pub fn new(url: Url, token: Token) -> Self {
    ObserveResource { url, token }
  }

  /// The URL that was registered
  pub fn url(&self) -> &Url {
    &self.url
  }

  /// The token notifications for this resource carry
  pub fn token(&self) -> Token {
    self.token
  }
}

impl fmt::Display for ObserveResource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ObserveResource({}, {})", self.url, self.token)
  }
}
