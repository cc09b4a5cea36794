use core::fmt;

use toad_macros::rfc_7252_doc;

#[doc = rfc_7252_doc!("12.1")]
/// <details><summary><b>RFC7252 Section 12.1.1 Method Codes</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("12.1.1"))]
/// </details>
/// <details><summary><b>RFC7252 Section 12.1.2 Response Codes</b></summary>
#[doc = concat!("\n#", rfc_7252_doc!("12.1.2"))]
/// </details>
///
/// # Examples
/// ```
/// use nymea_coap_msg::Code;
///
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05 Content".to_string());
/// assert_eq!(Code::from(0x84), Code::NOT_FOUND);
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for requests.
  pub detail: u8,
}

/// Whether a code is for a request, response, or empty message
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CodeKind {
  /// A request code (0.xx)
  Request,
  /// A response code (2.xx, 4.xx, 5.xx)
  Response,
  /// EMPTY (0.00)
  Empty,
}

macro_rules! codes {
  ($($name:ident = ($c:literal, $d:literal) $human:literal;)*) => {
    impl Code {
      $(
        #[doc = concat!("`", stringify!($c), ".", stringify!($d), " ", $human, "`")]
        #[allow(clippy::zero_prefixed_literal)]
        pub const $name: Code = Code::new($c, $d);
      )*

      /// The registered name of this code, if it is known
      ///
      /// ```
      /// use nymea_coap_msg::Code;
      ///
      /// assert_eq!(Code::CONTENT.name(), Some("Content"));
      /// assert_eq!(Code::new(3, 1).name(), None);
      /// ```
      pub fn name(&self) -> Option<&'static str> {
        match *self {
          $(| Code::$name => Some($human),)*
          | _ => None,
        }
      }
    }
  };
}

codes! {
  EMPTY = (0, 00) "Empty";
  GET = (0, 01) "Get";
  POST = (0, 02) "Post";
  PUT = (0, 03) "Put";
  DELETE = (0, 04) "Delete";

  CREATED = (2, 01) "Created";
  DELETED = (2, 02) "Deleted";
  VALID = (2, 03) "Valid";
  CHANGED = (2, 04) "Changed";
  CONTENT = (2, 05) "Content";
  CONTINUE = (2, 31) "Continue";

  BAD_REQUEST = (4, 00) "BadRequest";
  UNAUTHORIZED = (4, 01) "Unauthorized";
  BAD_OPTION = (4, 02) "BadOption";
  FORBIDDEN = (4, 03) "Forbidden";
  NOT_FOUND = (4, 04) "NotFound";
  METHOD_NOT_ALLOWED = (4, 05) "MethodNotAllowed";
  NOT_ACCEPTABLE = (4, 06) "NotAcceptable";
  REQUEST_ENTITY_INCOMPLETE = (4, 08) "RequestEntityIncomplete";
  PRECONDITION_FAILED = (4, 12) "PreconditionFailed";
  REQUEST_ENTITY_TOO_LARGE = (4, 13) "RequestEntityTooLarge";
  UNSUPPORTED_CONTENT_FORMAT = (4, 15) "UnsupportedContentFormat";

  INTERNAL_SERVER_ERROR = (5, 00) "InternalServerError";
  NOT_IMPLEMENTED = (5, 01) "NotImplemented";
  BAD_GATEWAY = (5, 02) "BadGateway";
  SERVICE_UNAVAILABLE = (5, 03) "ServiceUnavailable";
  GATEWAY_TIMEOUT = (5, 04) "GatewayTimeout";
  PROXYING_NOT_SUPPORTED = (5, 05) "ProxyingNotSupported";
}

impl Code {
  /// Create a new Code
  ///
  /// ```
  /// use nymea_coap_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Get the human string representation of a message code
  ///
  /// # Returns
  /// A `char` array
  ///
  /// This is to avoid unnecessary heap allocation,
  /// you can create a `String` with `FromIterator::<String>::from_iter`.
  /// ```
  /// use nymea_coap_msg::Code;
  ///
  /// let code = Code { class: 2, detail: 5 };
  /// let chars = code.to_human();
  /// let string = String::from_iter(chars);
  /// assert_eq!(string, "2.05".to_string());
  /// ```
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from(b'0' + d % 10);
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }

  /// Get whether this code is for a request, response, or empty message.
  ///
  /// ```
  /// use nymea_coap_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
  /// assert_eq!(Code::GET.kind(), CodeKind::Request);
  /// assert_eq!(Code::CONTENT.kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match self.class {
      | 0 if self.detail == 0 => CodeKind::Empty,
      | 0 => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }
}

impl fmt::Display for Code {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", String::from_iter(self.to_human()))?;

    match self.name() {
      | Some(name) => write!(f, " {}", name),
      | None => Ok(()),
    }
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    let class = (b & 0b1110_0000) >> 5;
    let detail = b & 0b0001_1111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail & 0b0001_1111;

    class | detail
  }
}
