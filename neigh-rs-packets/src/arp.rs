use crate::{DecodeError, EncodeError, EthernetFrame, MacAddr, ARP_ETHER_TYPE};
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

pub const ARP_HW_TYPE_ETHERNET: u16 = 1;
pub const ARP_PROTO_TYPE_IPV4: u16 = 0x0800;

/// Fixed payload size for Ethernet/IPv4 ARP: 8 byte header plus two
/// MAC/IPv4 address pairs.
pub const ARP_PAYLOAD_LEN: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

///
/// Decoded form of the ARP packet structure described in RFC 826,
/// restricted to the Ethernet/IPv4 pairing the switch fabric punts to us.
/// Decoding happens once; everything downstream dispatches on `op`.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub op: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

/// Encodes a 28-byte ARP payload from raw address buffers, all fields
/// big-endian. Each buffer must match its protocol length exactly.
pub fn encode_arp(
    op: ArpOp,
    sender_mac: &[u8],
    sender_ip: &[u8],
    target_mac: &[u8],
    target_ip: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    check_len("sender hardware address", sender_mac, 6)?;
    check_len("sender protocol address", sender_ip, 4)?;
    check_len("target hardware address", target_mac, 6)?;
    check_len("target protocol address", target_ip, 4)?;

    let mut payload = Vec::with_capacity(ARP_PAYLOAD_LEN);
    payload.extend_from_slice(&ARP_HW_TYPE_ETHERNET.to_be_bytes());
    payload.extend_from_slice(&ARP_PROTO_TYPE_IPV4.to_be_bytes());
    payload.push(6);
    payload.push(4);
    payload.extend_from_slice(&(op as u16).to_be_bytes());
    payload.extend_from_slice(sender_mac);
    payload.extend_from_slice(sender_ip);
    payload.extend_from_slice(target_mac);
    payload.extend_from_slice(target_ip);
    Ok(payload)
}

fn check_len(field: &'static str, buffer: &[u8], expected: usize) -> Result<(), EncodeError> {
    if buffer.len() != expected {
        return Err(EncodeError::BadAddressLength {
            field,
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

impl ArpMessage {
    /// A broadcast request: target MAC is the all-zero placeholder.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> ArpMessage {
        ArpMessage {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> ArpMessage {
        ArpMessage {
            op: ArpOp::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    ///
    /// Validates
    /// - The frame has an ARP ether type
    /// - The payload carries the Ethernet/IPv4 fixed header fields
    /// - The opcode is request or reply
    ///
    pub fn decode(frame: &EthernetFrame) -> Result<ArpMessage, DecodeError> {
        if frame.ether_type() != ARP_ETHER_TYPE {
            return Err(DecodeError::Malformed("frame does not have ARP ether type"));
        }

        let payload = frame.payload();
        if payload.len() < ARP_PAYLOAD_LEN {
            return Err(DecodeError::ShortFrame);
        }

        if u16::from_be_bytes(payload[0..2].try_into().unwrap()) != ARP_HW_TYPE_ETHERNET {
            return Err(DecodeError::Malformed("unsupported hardware type"));
        }
        if u16::from_be_bytes(payload[2..4].try_into().unwrap()) != ARP_PROTO_TYPE_IPV4 {
            return Err(DecodeError::Malformed("unsupported protocol type"));
        }
        if payload[4] != 6 || payload[5] != 4 {
            return Err(DecodeError::Malformed("unexpected address lengths"));
        }

        let op = match u16::from_be_bytes(payload[6..8].try_into().unwrap()) {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => return Err(DecodeError::UnsupportedType(other)),
        };

        Ok(ArpMessage {
            op,
            sender_mac: MacAddr::from_slice(&payload[8..14]).unwrap(),
            sender_ip: Ipv4Addr::from(<[u8; 4]>::try_from(&payload[14..18]).unwrap()),
            target_mac: MacAddr::from_slice(&payload[18..24]).unwrap(),
            target_ip: Ipv4Addr::from(<[u8; 4]>::try_from(&payload[24..28]).unwrap()),
        })
    }

    /// Builds the complete Ethernet frame carrying this message.
    pub fn to_frame(&self, dest_mac: MacAddr) -> EthernetFrame {
        // The address fields come from typed values, so the length checks
        // inside encode_arp cannot fail here.
        let payload = encode_arp(
            self.op,
            &self.sender_mac.bytes,
            &self.sender_ip.octets(),
            &self.target_mac.bytes,
            &self.target_ip.octets(),
        )
        .unwrap();

        let mut frame = EthernetFrame::empty();
        frame.set_dest_mac(dest_mac);
        frame.set_src_mac(self.sender_mac);
        frame.set_ether_type(ARP_ETHER_TYPE);
        frame.set_payload(&payload);
        frame
    }
}
