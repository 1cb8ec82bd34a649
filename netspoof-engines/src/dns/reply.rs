//! Decoding captured DNS queries and forging the matching replies

use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use netspoof_core::{Error, MacAddr, Result};
use netspoof_packet::{
    EtherType, EthernetFrame, IpProtocol, Ipv4Packet, Ipv6Packet, PacketBuilder, UdpDatagram,
    UdpPort,
};
use std::net::IpAddr;

/// A DNS message lifted out of a captured Ethernet frame
#[derive(Debug, Clone)]
pub struct CapturedQuery {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub message: Message,
}

impl CapturedQuery {
    /// Decode Ethernet → IPv4/IPv6 → UDP → DNS
    ///
    /// Frames that are not UDP traffic to port 53 yield `Ok(None)`; a
    /// payload on port 53 that is not valid DNS is an error.
    pub fn decode(frame: &[u8]) -> Result<Option<Self>> {
        let Some(eth) = EthernetFrame::from_bytes(frame) else {
            return Ok(None);
        };

        let (src_ip, dst_ip, segment) = match eth.ethertype {
            EtherType::IPv4 => match Ipv4Packet::from_bytes(&eth.payload) {
                Some(ip) if ip.protocol == IpProtocol::UDP => {
                    (IpAddr::V4(ip.source), IpAddr::V4(ip.destination), ip.payload)
                }
                _ => return Ok(None),
            },
            EtherType::IPv6 => match Ipv6Packet::from_bytes(&eth.payload) {
                Some(ip) if ip.next_header == IpProtocol::UDP => {
                    (IpAddr::V6(ip.source), IpAddr::V6(ip.destination), ip.payload)
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        let Some(udp) = UdpDatagram::from_bytes(&segment) else {
            return Ok(None);
        };
        if udp.destination_port != UdpPort::DNS {
            return Ok(None);
        }

        let message = Message::from_vec(&udp.payload)
            .map_err(|e| Error::parsing(format!("DNS from {}: {}", src_ip, e)))?;

        Ok(Some(Self {
            src_mac: eth.source,
            dst_mac: eth.destination,
            src_ip,
            dst_ip,
            src_port: udp.source_port.to_u16(),
            dst_port: udp.destination_port.to_u16(),
            message,
        }))
    }

    /// A standard query with questions and no answers yet
    pub fn is_plain_query(&self) -> bool {
        self.message.message_type() == MessageType::Query
            && self.message.op_code() == OpCode::Query
            && !self.message.queries().is_empty()
            && self.message.answers().is_empty()
    }
}

fn answer_data(record_type: RecordType, address: IpAddr) -> Option<RData> {
    match (record_type, address) {
        (RecordType::A, IpAddr::V4(v4)) => Some(RData::A(A(v4))),
        (RecordType::AAAA, IpAddr::V6(v6)) => Some(RData::AAAA(AAAA(v6))),
        _ => None,
    }
}

/// DNS response to `request` resolving `name` to `address`
///
/// Every question is echoed. Only questions for `name` whose type fits the
/// address family get an answer, so the reply may carry none.
pub fn reply_message(request: &Message, name: &Name, address: IpAddr, ttl: u32) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true);

    for query in request.queries() {
        reply.add_query(query.clone());
    }

    for query in request.queries().iter().filter(|q| q.name() == name) {
        let Some(rdata) = answer_data(query.query_type(), address) else {
            continue;
        };
        let mut record = Record::from_rdata(query.name().clone(), ttl, rdata);
        record.set_dns_class(query.query_class());
        reply.add_answer(record);
    }

    reply
}

/// Complete frame answering `query`, with every layer's addresses swapped
pub fn build_reply(query: &CapturedQuery, name: &Name, address: IpAddr, ttl: u32) -> Result<Vec<u8>> {
    let payload = reply_message(&query.message, name, address, ttl)
        .to_vec()
        .map_err(|e| Error::construction(format!("DNS encode: {}", e)))?;

    PacketBuilder::new()
        .ethernet(query.dst_mac, query.src_mac)
        .ip(query.dst_ip, query.src_ip)?
        .udp(query.dst_port, query.src_port)
        .payload(payload)
        .build()
}
