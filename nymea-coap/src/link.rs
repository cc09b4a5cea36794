//! CoRE Link Format ([RFC 6690](https://www.rfc-editor.org/rfc/rfc6690))
//!
//! Servers list their resources at `/.well-known/core` as a
//! comma-separated list of links, each a `<path>` followed by
//! `;`-separated attributes:
//!
//! ```text
//! </sensors/temp>;rt="temperature";obs,</led>;if="actuator";ct=0
//! ```

use core::fmt;

use nymea_coap_msg::known::ContentFormat;

/// One link of a link-format document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoreLink {
  path: String,
  title: String,
  resource_type: String,
  interface_description: String,
  #[cfg_attr(feature = "serde", serde(serialize_with = "content_format_number"))]
  content_format: ContentFormat,
  maximum_size: Option<u32>,
  observable: bool,
}

#[cfg(feature = "serde")]
fn content_format_number<S: serde::Serializer>(format: &ContentFormat,
                                               s: S)
                                               -> Result<S::Ok, S::Error> {
  s.serialize_u16(u16::from(format))
}

impl CoreLink {
  /// A link to `path` with no attributes
  pub fn new(path: impl ToString) -> Self {
    CoreLink { path: path.to_string(),
               title: String::new(),
               resource_type: String::new(),
               interface_description: String::new(),
               content_format: ContentFormat::Text,
               maximum_size: None,
               observable: false }
  }

  /// Target of the link
  pub fn path(&self) -> &str {
    &self.path
  }

  /// `title`
  pub fn title(&self) -> &str {
    &self.title
  }

  /// `rt`
  pub fn resource_type(&self) -> &str {
    &self.resource_type
  }

  /// `if`
  pub fn interface_description(&self) -> &str {
    &self.interface_description
  }

  /// `ct`, [`ContentFormat::Text`] when absent
  pub fn content_format(&self) -> ContentFormat {
    self.content_format
  }

  /// `sz`, the estimated size of the resource in bytes
  pub fn maximum_size(&self) -> Option<u32> {
    self.maximum_size
  }

  /// Whether the link carries `obs`
  pub fn is_observable(&self) -> bool {
    self.observable
  }
}

impl fmt::Display for CoreLink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "CoapLink({})", self.path)?;

    if !self.title.is_empty() {
      writeln!(f, "  Title: {}", self.title)?;
    }

    writeln!(f, "  Resource type: {}", self.resource_type)?;
    writeln!(f, "  Content type: {}", self.content_format)?;

    if self.observable {
      writeln!(f, "  Observable: true")?;
    }

    if !self.interface_description.is_empty() {
      writeln!(f, "  Interface description: {}", self.interface_description)?;
    }

    match self.maximum_size {
      | Some(size) => writeln!(f, "  Maximum size: {}", size),
      | None => Ok(()),
    }
  }
}

/// Parses the payload of a `/.well-known/core` response.
///
/// Links that do not start with a `<path>` are dropped,
/// as are attributes that are not understood.
///
/// ```
/// use nymea_coap::CoreLinkParser;
///
/// let parser = CoreLinkParser::new(br#"</sensors/temp>;rt="temperature";obs"#);
/// let link = &parser.links()[0];
///
/// assert_eq!(link.path(), "/sensors/temp");
/// assert_eq!(link.resource_type(), "temperature");
/// assert!(link.is_observable());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreLinkParser {
  links: Vec<CoreLink>,
}

impl CoreLinkParser {
  /// Parse a link-format payload
  pub fn new(payload: &[u8]) -> Self {
    CoreLinkParser { links: Self::parse(payload) }
  }

  /// The links that were parsed, in document order
  pub fn links(&self) -> &[CoreLink] {
    &self.links
  }

  /// Take the parsed links
  pub fn into_links(self) -> Vec<CoreLink> {
    self.links
  }

  /// Parse a link-format payload into its links
  pub fn parse(payload: &[u8]) -> Vec<CoreLink> {
    let text = String::from_utf8_lossy(payload);

    split_unquoted(&text, ',').into_iter()
                              .map(str::trim)
                              .filter(|raw| !raw.is_empty())
                              .filter_map(parse_link)
                              .collect()
  }
}

/// Split on `sep`, ignoring separators inside double quotes
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut start = 0;
  let mut quoted = false;

  for (ix, c) in s.char_indices() {
    match c {
      | '"' => quoted = !quoted,
      | c if c == sep && !quoted => {
        parts.push(&s[start..ix]);
        start = ix + c.len_utf8();
      },
      | _ => (),
    }
  }

  parts.push(&s[start..]);
  parts
}

fn unquote(value: &str) -> &str {
  value.strip_prefix('"')
       .and_then(|v| v.strip_suffix('"'))
       .unwrap_or(value)
}

fn parse_link(raw: &str) -> Option<CoreLink> {
  let mut attrs = split_unquoted(raw, ';').into_iter().map(str::trim);

  let path = match attrs.next()
                        .and_then(|target| target.strip_prefix('<'))
                        .and_then(|target| target.strip_suffix('>'))
  {
    | Some(path) => path,
    | None => {
      log::debug!("skipping link without a target: {:?}", raw);
      return None;
    },
  };

  let mut link = CoreLink::new(path);

  for attr in attrs {
    let (name, value) = match attr.split_once('=') {
      | Some((name, value)) => (name.trim(), Some(unquote(value.trim()))),
      | None => (attr, None),
    };

    match (name, value) {
      | ("obs", None) => link.observable = true,
      | ("rt", Some(rt)) => link.resource_type = rt.to_string(),
      | ("if", Some(iface)) => link.interface_description = iface.to_string(),
      | ("title", Some(title)) => link.title = title.to_string(),
      | ("sz", Some(sz)) => match sz.parse() {
        | Ok(sz) => link.maximum_size = Some(sz),
        | Err(_) => log::debug!("ignoring sz={:?} of <{}>", sz, path),
      },
      // ct may list several formats; the first one wins
      | ("ct", Some(ct)) => match ct.split_whitespace().next().and_then(|ct| ct.parse::<u16>().ok()) {
        | Some(ct) => link.content_format = ContentFormat::from(ct),
        | None => log::debug!("ignoring ct={:?} of <{}>", ct, path),
      },
      | _ => log::trace!("ignoring attribute {:?} of <{}>", attr, path),
    }
  }

  Some(link)
}
