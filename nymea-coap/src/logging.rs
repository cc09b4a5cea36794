use nymea_coap_msg::Pdu;

pub(crate) fn pdu_summary(pdu: &Pdu) -> String {
  format!("{:?} {} id={} token={} opts={} with {} byte payload",
          pdu.ty,
          pdu.code,
          pdu.id,
          pdu.token,
          pdu.opts().len(),
          pdu.payload().len())
}

#[cfg(test)]
mod tests {
  use nymea_coap_msg::{known, Code, Id, Token, Type};

  use super::*;

  #[test]
  fn summary() {
    let mut pdu = Pdu::new(Type::Con, Code::GET, Id(12), Token::from_slice(&[0xab]));
    pdu.add_option(known::PATH, "temp");
    pdu.set_payload(vec![1, 2]);

    assert_eq!(pdu_summary(&pdu),
               "Con 0.01 Get id=12 token=0xab opts=1 with 2 byte payload");
  }
}
