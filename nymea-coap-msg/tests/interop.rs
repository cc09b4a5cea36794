//! Messages packed here must decode the same way in an independent CoAP implementation.

use nymea_coap_msg::known::{Block, ContentFormat};
use nymea_coap_msg::*;

fn request() -> Pdu {
  let mut pdu = Pdu::new(Type::Con, Code::PUT, Id(0x4242), Token::from_slice(&[9, 8, 7]));
  pdu.add_option(known::BLOCK1, Block::new(1, 2, true).to_bytes());
  pdu.add_option(known::PATH, "lights");
  pdu.add_option(known::HOST, "hub.local");
  pdu.add_option(known::PATH, "kitchen");
  pdu.add_option(known::CONTENT_FORMAT, ContentFormat::Json.bytes());
  pdu.add_option(known::QUERY, "level=3");
  pdu.set_payload(vec![b'x'; 64]);
  pdu
}

#[test]
fn coap_lite_decodes_packed_request() {
  let bytes = request().pack().unwrap();
  let packet = coap_lite::Packet::from_bytes(&bytes).unwrap();

  assert_eq!(packet.header.message_id, 0x4242);
  assert_eq!(&packet.get_token()[..], &[9, 8, 7]);
  assert_eq!(packet.payload, vec![b'x'; 64]);
}

#[test]
fn parses_coap_lite_output() {
  let bytes = request().pack().unwrap();
  let theirs = coap_lite::Packet::from_bytes(&bytes).unwrap()
                                                    .to_bytes()
                                                    .unwrap();
  let pdu = Pdu::try_from_bytes(&theirs).unwrap();

  assert_eq!(pdu, request());
  assert_eq!(pdu.block1(), Some(Block::new(1, 2, true)));
  assert_eq!(pdu.content_format(), ContentFormat::Json);
}
