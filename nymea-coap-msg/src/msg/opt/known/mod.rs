/// Block1 / Block2 values
pub mod block;
pub use block::*;

/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Observe values
pub mod observe;

macro_rules! opt {
  (rfc7252($section:literal) $name:ident = $n:literal) => {
    #[doc = ::toad_macros::rfc_7252_doc!($section)]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
  (#[doc = $doc:expr] $name:ident = $n:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
}

pub(crate) use opt;

/// Non-repeatable options
pub mod no_repeat {
  use super::opt;

  opt!(rfc7252("5.10.1") HOST = 3);
  opt!(rfc7252("5.10.8.2") IF_NONE_MATCH = 5);
  opt!(#[doc = "Observe (RFC7641). Carries the register / deregister action in requests and a sequence number in notifications."]
       OBSERVE = 6);
  opt!(#[doc = "See [`HOST`]"]
       PORT = 7);
  opt!(rfc7252("5.10.3") CONTENT_FORMAT = 12);
  opt!(rfc7252("5.10.5") MAX_AGE = 14);
  opt!(rfc7252("5.10.4") ACCEPT = 17);
  opt!(#[doc = "Block2 (RFC7959): describes a block of the response payload. See [`super::Block`]"]
       BLOCK2 = 23);
  opt!(#[doc = "Block1 (RFC7959): describes a block of the request payload. See [`super::Block`]"]
       BLOCK1 = 27);
  opt!(rfc7252("5.10.2") PROXY_URI = 35);
  opt!(#[doc = "See [`PROXY_URI`]"]
       PROXY_SCHEME = 39);
  opt!(rfc7252("5.10.9") SIZE1 = 60);
}

/// Repeatable options
pub mod repeat {
  use super::opt;

  opt!(rfc7252("5.10.8.1") IF_MATCH = 1);
  opt!(rfc7252("5.10.7") LOCATION_PATH = 8);
  opt!(#[doc = "See [`super::no_repeat::HOST`]"]
       PATH = 11);
  opt!(#[doc = "See [`super::no_repeat::HOST`]"]
       QUERY = 15);
  opt!(#[doc = "See [`LOCATION_PATH`]"]
       LOCATION_QUERY = 20);
  opt!(#[doc = concat!(
                toad_macros::rfc_7252_doc!("5.10.6"),
                "\n<details><summary>ETag as a Request Option</summary>\n\n",
                toad_macros::rfc_7252_doc!("5.10.6.2"),
                "\n</details><details><summary>ETag as a Response Option</summary>\n\n",
                toad_macros::rfc_7252_doc!("5.10.6.1"),
                "</details>"
      )]
       ETAG = 4);
}

pub use no_repeat::*;
pub use repeat::*;

/// The registered name of an option number
///
/// ```
/// use nymea_coap_msg::{known, OptNumber};
///
/// assert_eq!(known::name(known::PATH), Some("UriPath"));
/// assert_eq!(known::name(OptNumber(2048)), None);
/// ```
pub fn name(number: crate::OptNumber) -> Option<&'static str> {
  let name = match number {
    | IF_MATCH => "IfMatch",
    | HOST => "UriHost",
    | ETAG => "ETag",
    | IF_NONE_MATCH => "IfNoneMatch",
    | OBSERVE => "Observe",
    | PORT => "UriPort",
    | LOCATION_PATH => "LocationPath",
    | PATH => "UriPath",
    | CONTENT_FORMAT => "ContentFormat",
    | MAX_AGE => "MaxAge",
    | QUERY => "UriQuery",
    | ACCEPT => "Accept",
    | LOCATION_QUERY => "LocationQuery",
    | BLOCK2 => "Block2",
    | BLOCK1 => "Block1",
    | PROXY_URI => "ProxyUri",
    | PROXY_SCHEME => "ProxyScheme",
    | SIZE1 => "Size1",
    | _ => return None,
  };

  Some(name)
}
