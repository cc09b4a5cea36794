use core::fmt;
use std::net::IpAddr;

use nymea_coap_msg::known::ContentFormat;
use nymea_coap_msg::{Code, Type};
use toad_macros::rfc_7252_doc;
use url::Url;

/// Request method
///
/// <details><summary><b>RFC7252 Section 5.8 Method Definitions</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("5.8"))]
/// </details>
///
/// [`Method::Empty`] sends an empty message, which is how CoAP "pings" a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
  /// Empty message (ping)
  Empty,
  /// GET
  Get,
  /// POST
  Post,
  /// PUT
  Put,
  /// DELETE
  Delete,
}

impl Method {
  /// The message code requests with this method are sent with
  ///
  /// ```
  /// use nymea_coap::Method;
  /// use nymea_coap_msg::Code;
  ///
  /// assert_eq!(Method::Put.code(), Code::PUT);
  /// assert_eq!(Method::Empty.code(), Code::EMPTY);
  /// ```
  pub fn code(&self) -> Code {
    match self {
      | Method::Empty => Code::EMPTY,
      | Method::Get => Code::GET,
      | Method::Post => Code::POST,
      | Method::Put => Code::PUT,
      | Method::Delete => Code::DELETE,
    }
  }

  /// Whether requests with this method carry a payload
  pub fn has_payload(&self) -> bool {
    matches!(self, Method::Post | Method::Put)
  }

  /// Get the method a request code stands for, if any
  pub fn from_code(code: Code) -> Option<Method> {
    match code {
      | Code::EMPTY => Some(Method::Empty),
      | Code::GET => Some(Method::Get),
      | Code::POST => Some(Method::Post),
      | Code::PUT => Some(Method::Put),
      | Code::DELETE => Some(Method::Delete),
      | _ => None,
    }
  }
}

impl From<Method> for Code {
  fn from(m: Method) -> Code {
    m.code()
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      | Method::Empty => "PING",
      | Method::Get => "GET",
      | Method::Post => "POST",
      | Method::Put => "PUT",
      | Method::Delete => "DELETE",
    };

    write!(f, "{}", name)
  }
}

/// Description of a request: the target URL, the message type to send it
/// with and the Content-Format of its payload.
///
/// The URL scheme must be `coap`; anything else makes the reply finish with
/// [`ReplyError::InvalidUrlScheme`](crate::ReplyError::InvalidUrlScheme)
/// without sending anything.
///
/// ```
/// use nymea_coap::Request;
/// use nymea_coap_msg::known::ContentFormat;
/// use nymea_coap_msg::Type;
///
/// let req = Request::parse("coap://coap.me:5684/sensors/temp?unit=c").unwrap()
///                                                                  .with_message_type(Type::Non)
///                                                                  .with_content_format(ContentFormat::Json);
///
/// assert_eq!(req.message_type(), Type::Non);
/// assert_eq!(req.content_format(), ContentFormat::Json);
/// assert_eq!(req.url().port(), Some(5684));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
  url: Url,
  message_type: Type,
  content_format: ContentFormat,
}

impl Request {
  /// Create a confirmable, `text/plain` request for `url`
  pub fn new(url: Url) -> Self {
    Request { url,
              message_type: Type::Con,
              content_format: ContentFormat::Text }
  }

  /// Parse `url` and create a request for it
  pub fn parse(url: &str) -> Result<Self, url::ParseError> {
    Url::parse(url).map(Request::new)
  }

  /// Use a different message type ([`Type::Con`] by default)
  pub fn with_message_type(mut self, ty: Type) -> Self {
    self.message_type = ty;
    self
  }

  /// Use a different payload Content-Format ([`ContentFormat::Text`] by default)
  pub fn with_content_format(mut self, format: ContentFormat) -> Self {
    self.content_format = format;
    self
  }

  /// The target URL
  pub fn url(&self) -> &Url {
    &self.url
  }

  /// The message type requests are sent with
  pub fn message_type(&self) -> Type {
    self.message_type
  }

  /// Content-Format of the request payload
  pub fn content_format(&self) -> ContentFormat {
    self.content_format
  }

  pub(crate) fn is_coap(&self) -> bool {
    self.url.scheme() == "coap"
  }

  /// Host as written in the URL (brackets of IPv6 literals removed)
  pub(crate) fn host(&self) -> Option<&str> {
    self.url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
  }

  /// The host, if it is an IP address literal
  pub(crate) fn host_ip(&self) -> Option<IpAddr> {
    self.host().and_then(|h| h.parse().ok())
  }

  pub(crate) fn port(&self, default: u16) -> u16 {
    self.url.port().unwrap_or(default)
  }

  /// Path segments with empty segments dropped
  pub(crate) fn path_segments(&self) -> impl Iterator<Item = &str> {
    self.url.path().split('/').filter(|s| !s.is_empty())
  }

  /// `&`-separated query parameters with empty parameters dropped
  pub(crate) fn query_params(&self) -> impl Iterator<Item = &str> {
    self.url
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|s| !s.is_empty())
  }
}
