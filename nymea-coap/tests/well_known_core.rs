use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use nymea_coap::blocking::Client;
use nymea_coap::{CoreLinkParser, Request};
use nymea_coap_msg::known::{self, Block, ContentFormat};
use nymea_coap_msg::{Code, Pdu, Type};

const DIRECTORY: &str = concat!("</sensors/temp>;rt=\"temperature-c\";if=\"sensor\";obs,",
                                "</sensors/light>;rt=\"light-lux\";title=\"Ambient light\";ct=0,",
                                "</firmware>;sz=262144;ct=42,",
                                "</.well-known/core>;ct=40");

/// Serve `/.well-known/core` in 64 byte blocks until the last one is sent
fn serve_directory(sock: UdpSocket) {
  let mut buf = [0u8; 1152];
  let body = DIRECTORY.as_bytes();

  loop {
    let (n, client) = sock.recv_from(&mut buf).unwrap();
    let req = Pdu::unpack(&buf[..n]);
    assert_eq!(req.code, Code::GET);

    let path = req.options(known::PATH)
                  .map(|o| String::from_utf8_lossy(o.value.as_bytes()).into_owned())
                  .collect::<Vec<_>>();
    assert_eq!(path, vec![".well-known", "core"]);

    let num = req.block2().map(|b| b.num()).unwrap_or(0);
    let start = num as usize * 64;
    let end = usize::min(start + 64, body.len());
    let more = end < body.len();

    let mut rep = Pdu::new(Type::Ack, Code::CONTENT, req.id, req.token);
    rep.add_option(known::CONTENT_FORMAT, ContentFormat::LinkFormat.bytes());
    rep.add_option(known::BLOCK2, Block::new(num, 2, more).to_bytes());
    rep.set_payload(body[start..end].to_vec());
    sock.send_to(&rep.pack().unwrap(), client).unwrap();

    if !more {
      return;
    }
  }
}

#[test]
fn discover_resources() {
  simple_logger::init_with_level(log::Level::Trace).ok();

  let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
  sock.set_read_timeout(Some(Duration::from_secs(10)))
      .unwrap();
  let port = sock.local_addr().unwrap().port();
  let server = thread::spawn(move || serve_directory(sock));

  let mut client = Client::try_new_std(0).unwrap();
  let url = format!("coap://127.0.0.1:{}/.well-known/core", port);
  let reply = client.get(Request::parse(&url).unwrap()).unwrap();
  server.join().unwrap();

  assert_eq!(reply.error(), None);
  assert_eq!(reply.status_code(), Code::CONTENT);
  assert_eq!(reply.content_format(), ContentFormat::LinkFormat);
  assert_eq!(reply.payload(), DIRECTORY.as_bytes());

  let parser = CoreLinkParser::new(reply.payload());
  let links = parser.links();
  assert_eq!(links.len(), 4);

  assert_eq!(links[0].path(), "/sensors/temp");
  assert_eq!(links[0].resource_type(), "temperature-c");
  assert!(links[0].is_observable());

  assert_eq!(links[1].title(), "Ambient light");
  assert_eq!(links[1].content_format(), ContentFormat::Text);

  assert_eq!(links[2].maximum_size(), Some(262144));
  assert_eq!(links[3].content_format(), ContentFormat::LinkFormat);
}
