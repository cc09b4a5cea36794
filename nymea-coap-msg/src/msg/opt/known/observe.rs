use tinyvec::ArrayVec;

/// When included in a GET request, the Observe Option extends the GET
/// method so it does not only retrieve a current representation of the
/// target resource, but also requests the server to add or remove an
/// entry in the list of observers of the resource depending on the
/// option value.  The list entry consists of the client endpoint and the
/// token specified by the client in the request.  Possible values are:
///
///    `0` (register) adds the entry to the list, if not present;
///
///    `1` (deregister) removes the entry from the list, if present
///
/// The action is encoded as an option uint (see [`uint_bytes`]),
/// so `Register` travels as the empty value.
#[derive(Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Action {
  /// Tells the resource owner we would like to observe updates to
  /// the resource we've issued a GET request for.
  Register,
  /// Tells the resource owner we would no longer like to observe updates to
  /// the resource we've issued a GET request for.
  Deregister,
}

impl Action {
  /// Try to parse from a single byte
  pub fn from_byte(n: u8) -> Option<Self> {
    match n {
      | 0 => Some(Action::Register),
      | 1 => Some(Action::Deregister),
      | _ => None,
    }
  }
}

impl From<Action> for u8 {
  fn from(a: Action) -> Self {
    match a {
      | Action::Register => 0,
      | Action::Deregister => 1,
    }
  }
}

/// Decode the sequence number of a notification.
///
/// The value is a big-endian unsigned integer of 0 to 3 bytes;
/// only the last 3 bytes of a longer value are used.
///
/// ```
/// use nymea_coap_msg::known::observe;
///
/// assert_eq!(observe::sequence(&[]), 0);
/// assert_eq!(observe::sequence(&[0x12]), 0x12);
/// assert_eq!(observe::sequence(&[0x01, 0x02, 0x03]), 0x010203);
/// ```
pub fn sequence(bytes: &[u8]) -> u32 {
  let skip = bytes.len().saturating_sub(3);
  bytes.iter()
       .skip(skip)
       .fold(0u32, |n, b| (n << 8) | u32::from(*b))
}

/// Encode an unsigned integer option value in as few bytes as possible
/// (zero is the empty value)
///
/// ```
/// use nymea_coap_msg::known::observe::uint_bytes;
///
/// assert!(uint_bytes(0).is_empty());
/// assert_eq!(uint_bytes(0x1234).as_slice(), &[0x12, 0x34]);
/// ```
pub fn uint_bytes(n: u32) -> ArrayVec<[u8; 4]> {
  let bytes = n.to_be_bytes();
  let skip = bytes.iter().take_while(|b| **b == 0).count();

  let mut out = ArrayVec::new();
  out.extend(bytes[skip..].iter().copied());
  out
}

/// Decode an unsigned integer option value (at most 4 bytes are considered)
pub fn uint(bytes: &[u8]) -> u32 {
  let skip = bytes.len().saturating_sub(4);
  bytes.iter()
       .skip(skip)
       .fold(0u32, |n, b| (n << 8) | u32::from(*b))
}
