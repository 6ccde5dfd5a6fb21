use crate::{DecodeError, EthernetFrame, MacAddr, IPV6_ETHER_TYPE};
use std::borrow::Cow;
use std::convert::{TryFrom, TryInto};
use std::net::Ipv6Addr;

#[derive(Clone, Debug)]
pub struct Ipv6Packet {
    pub data: Vec<u8>,
    pub packet_offset: usize,
    pub payload_offset: usize,
}

impl Ipv6Packet {
    pub fn from_buffer(packet: Vec<u8>, packet_offset: usize) -> Result<Ipv6Packet, DecodeError> {
        // Header of IPv6 packet: 40 bytes minimum
        if packet.len() < packet_offset + 40 {
            return Err(DecodeError::ShortFrame);
        }

        let version = (packet[packet_offset] & 0xF0) >> 4;
        if version != 6 {
            return Err(DecodeError::Malformed("packet is not IPv6"));
        }

        // The buffer may run longer than the payload (Ethernet minimum-frame
        // padding), but must never run shorter.
        let payload_len = u16::from_be_bytes(
            packet[packet_offset + 4..=packet_offset + 5]
                .try_into()
                .unwrap(),
        ) as usize;
        if packet_offset + 40 + payload_len > packet.len() {
            return Err(DecodeError::Malformed("payload length overruns buffer"));
        }

        Ok(Ipv6Packet {
            data: packet,
            packet_offset,
            payload_offset: packet_offset + 40,
        })
    }

    /// Builds a packet from scratch, used when synthesizing advertisements.
    pub fn new(
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
        hop_limit: u8,
        payload: &[u8],
    ) -> Ipv6Packet {
        // The payload-length field is 16 bits; a longer payload would encode
        // a self-inconsistent header.
        assert!(
            payload.len() <= usize::from(u16::MAX),
            "payload does not fit the IPv6 payload-length field"
        );
        let mut data = vec![0; 40];
        data[0] = 0x60;
        data[4..6].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        data[6] = next_header;
        data[7] = hop_limit;
        data[8..24].copy_from_slice(&src.octets());
        data[24..40].copy_from_slice(&dst.octets());
        data.extend_from_slice(payload);
        Ipv6Packet {
            data,
            packet_offset: 0,
            payload_offset: 40,
        }
    }

    pub fn payload_length(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.packet_offset + 4..=self.packet_offset + 5]
                .try_into()
                .unwrap(),
        )
    }

    pub fn next_header(&self) -> u8 {
        self.data[self.packet_offset + 6]
    }

    pub fn hop_limit(&self) -> u8 {
        self.data[self.packet_offset + 7]
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        let bytes =
            <[u8; 16]>::try_from(&self.data[self.packet_offset + 8..self.packet_offset + 24])
                .unwrap();
        Ipv6Addr::from(bytes)
    }

    pub fn dest_addr(&self) -> Ipv6Addr {
        let bytes =
            <[u8; 16]>::try_from(&self.data[self.packet_offset + 24..self.packet_offset + 40])
                .unwrap();
        Ipv6Addr::from(bytes)
    }

    /// Exactly payload-length bytes; trailing frame padding is excluded.
    pub fn payload(&self) -> Cow<[u8]> {
        let end = self.payload_offset + self.payload_length() as usize;
        Cow::from(&self.data[self.payload_offset..end])
    }

    /// Wraps this packet in an Ethernet frame for transmission.
    pub fn to_frame(&self, src_mac: MacAddr, dest_mac: MacAddr) -> EthernetFrame {
        let mut frame = EthernetFrame::empty();
        frame.set_dest_mac(dest_mac);
        frame.set_src_mac(src_mac);
        frame.set_ether_type(IPV6_ETHER_TYPE);
        frame.set_payload(&self.data[self.packet_offset..]);
        frame
    }
}
