use crate::checksum::pseudo_header_checksum;
use crate::{DecodeError, MacAddr, ICMPV6_NEXT_HEADER};
use std::convert::{TryFrom, TryInto};
use std::net::Ipv6Addr;

pub const ICMPV6_ROUTER_SOLICITATION: u8 = 133;
pub const ICMPV6_ROUTER_ADVERTISEMENT: u8 = 134;
pub const ICMPV6_NEIGHBOR_SOLICITATION: u8 = 135;
pub const ICMPV6_NEIGHBOR_ADVERTISEMENT: u8 = 136;

pub const ND_OPT_SOURCE_LLA: u8 = 1;
pub const ND_OPT_TARGET_LLA: u8 = 2;
pub const ND_OPT_PREFIX_INFORMATION: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSolicitation {
    pub source_lla: Option<MacAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterAdvertisement {
    pub cur_hop_limit: u8,
    pub managed: bool,
    pub other: bool,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
    pub source_lla: Option<MacAddr>,
    /// Advertised in exactly this order.
    pub prefixes: Vec<PrefixInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSolicitation {
    pub target: Ipv6Addr,
    pub source_lla: Option<MacAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborAdvertisement {
    pub router: bool,
    pub solicited: bool,
    pub override_cache: bool,
    pub target: Ipv6Addr,
    pub target_lla: Option<MacAddr>,
}

/// Prefix Information option (type 3), always 32 bytes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixInformation {
    pub prefix_len: u8,
    pub on_link: bool,
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub prefix: Ipv6Addr,
}

///
/// The four neighbor-discovery messages this engine speaks, decoded once
/// and dispatched by pattern match. Checksums are verified on decode and
/// computed on encode; callers never touch the checksum field.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmpv6Message {
    RouterSolicitation(RouterSolicitation),
    RouterAdvertisement(RouterAdvertisement),
    NeighborSolicitation(NeighborSolicitation),
    NeighborAdvertisement(NeighborAdvertisement),
}

impl Icmpv6Message {
    ///
    /// Decodes an ICMPv6 message body. The pseudo-header checksum is
    /// recomputed first; a mismatch yields `InvalidChecksum` and the
    /// caller is expected to drop the frame without replying.
    ///
    pub fn decode(src: Ipv6Addr, dst: Ipv6Addr, body: &[u8]) -> Result<Icmpv6Message, DecodeError> {
        if body.len() < 8 {
            return Err(DecodeError::ShortFrame);
        }
        if pseudo_header_checksum(src, dst, ICMPV6_NEXT_HEADER, body) != 0 {
            return Err(DecodeError::InvalidChecksum);
        }

        match body[0] {
            ICMPV6_ROUTER_SOLICITATION => {
                let options = NdOptions::parse(&body[8..])?;
                Ok(Icmpv6Message::RouterSolicitation(RouterSolicitation {
                    source_lla: options.source_lla,
                }))
            }
            ICMPV6_ROUTER_ADVERTISEMENT => {
                if body.len() < 16 {
                    return Err(DecodeError::ShortFrame);
                }
                let options = NdOptions::parse(&body[16..])?;
                Ok(Icmpv6Message::RouterAdvertisement(RouterAdvertisement {
                    cur_hop_limit: body[4],
                    managed: body[5] & 0x80 != 0,
                    other: body[5] & 0x40 != 0,
                    router_lifetime: u16::from_be_bytes(body[6..8].try_into().unwrap()),
                    reachable_time: u32::from_be_bytes(body[8..12].try_into().unwrap()),
                    retrans_timer: u32::from_be_bytes(body[12..16].try_into().unwrap()),
                    source_lla: options.source_lla,
                    prefixes: options.prefixes,
                }))
            }
            ICMPV6_NEIGHBOR_SOLICITATION => {
                if body.len() < 24 {
                    return Err(DecodeError::ShortFrame);
                }
                let options = NdOptions::parse(&body[24..])?;
                Ok(Icmpv6Message::NeighborSolicitation(NeighborSolicitation {
                    target: read_addr(&body[8..24]),
                    source_lla: options.source_lla,
                }))
            }
            ICMPV6_NEIGHBOR_ADVERTISEMENT => {
                if body.len() < 24 {
                    return Err(DecodeError::ShortFrame);
                }
                let options = NdOptions::parse(&body[24..])?;
                Ok(Icmpv6Message::NeighborAdvertisement(NeighborAdvertisement {
                    router: body[4] & 0x80 != 0,
                    solicited: body[4] & 0x40 != 0,
                    override_cache: body[4] & 0x20 != 0,
                    target: read_addr(&body[8..24]),
                    target_lla: options.target_lla,
                }))
            }
            other => Err(DecodeError::UnsupportedType(u16::from(other))),
        }
    }

    /// Encodes the message body with a freshly computed checksum.
    pub fn encode(&self, src: Ipv6Addr, dst: Ipv6Addr) -> Vec<u8> {
        let mut body = match self {
            Icmpv6Message::RouterSolicitation(rs) => {
                let mut body = vec![ICMPV6_ROUTER_SOLICITATION, 0, 0, 0, 0, 0, 0, 0];
                if let Some(mac) = rs.source_lla {
                    push_lla_option(&mut body, ND_OPT_SOURCE_LLA, mac);
                }
                body
            }
            Icmpv6Message::RouterAdvertisement(ra) => {
                let mut flags = 0u8;
                if ra.managed {
                    flags |= 0x80;
                }
                if ra.other {
                    flags |= 0x40;
                }
                let mut body = vec![ICMPV6_ROUTER_ADVERTISEMENT, 0, 0, 0, ra.cur_hop_limit, flags];
                body.extend_from_slice(&ra.router_lifetime.to_be_bytes());
                body.extend_from_slice(&ra.reachable_time.to_be_bytes());
                body.extend_from_slice(&ra.retrans_timer.to_be_bytes());
                if let Some(mac) = ra.source_lla {
                    push_lla_option(&mut body, ND_OPT_SOURCE_LLA, mac);
                }
                for prefix in &ra.prefixes {
                    push_prefix_option(&mut body, prefix);
                }
                body
            }
            Icmpv6Message::NeighborSolicitation(ns) => {
                let mut body = vec![ICMPV6_NEIGHBOR_SOLICITATION, 0, 0, 0, 0, 0, 0, 0];
                body.extend_from_slice(&ns.target.octets());
                if let Some(mac) = ns.source_lla {
                    push_lla_option(&mut body, ND_OPT_SOURCE_LLA, mac);
                }
                body
            }
            Icmpv6Message::NeighborAdvertisement(na) => {
                let mut flags = 0u8;
                if na.router {
                    flags |= 0x80;
                }
                if na.solicited {
                    flags |= 0x40;
                }
                if na.override_cache {
                    flags |= 0x20;
                }
                let mut body = vec![ICMPV6_NEIGHBOR_ADVERTISEMENT, 0, 0, 0, flags, 0, 0, 0];
                body.extend_from_slice(&na.target.octets());
                if let Some(mac) = na.target_lla {
                    push_lla_option(&mut body, ND_OPT_TARGET_LLA, mac);
                }
                body
            }
        };

        let sum = pseudo_header_checksum(src, dst, ICMPV6_NEXT_HEADER, &body);
        body[2..4].copy_from_slice(&sum.to_be_bytes());
        body
    }
}

fn read_addr(bytes: &[u8]) -> Ipv6Addr {
    Ipv6Addr::from(<[u8; 16]>::try_from(bytes).unwrap())
}

fn push_lla_option(body: &mut Vec<u8>, kind: u8, mac: MacAddr) {
    body.push(kind);
    body.push(1);
    body.extend_from_slice(&mac.bytes);
}

fn push_prefix_option(body: &mut Vec<u8>, prefix: &PrefixInformation) {
    let mut flags = 0u8;
    if prefix.on_link {
        flags |= 0x80;
    }
    if prefix.autonomous {
        flags |= 0x40;
    }
    body.push(ND_OPT_PREFIX_INFORMATION);
    body.push(4);
    body.push(prefix.prefix_len);
    body.push(flags);
    body.extend_from_slice(&prefix.valid_lifetime.to_be_bytes());
    body.extend_from_slice(&prefix.preferred_lifetime.to_be_bytes());
    body.extend_from_slice(&[0; 4]);
    body.extend_from_slice(&prefix.prefix.octets());
}

/// The ND options this engine cares about, collected in one TLV walk.
/// Unknown option types are skipped, as RFC 4861 requires.
struct NdOptions {
    source_lla: Option<MacAddr>,
    target_lla: Option<MacAddr>,
    prefixes: Vec<PrefixInformation>,
}

impl NdOptions {
    fn parse(mut data: &[u8]) -> Result<NdOptions, DecodeError> {
        let mut options = NdOptions {
            source_lla: None,
            target_lla: None,
            prefixes: Vec::new(),
        };

        while !data.is_empty() {
            if data.len() < 2 {
                return Err(DecodeError::Malformed("truncated option header"));
            }
            let kind = data[0];
            let len = data[1] as usize * 8;
            if len == 0 {
                return Err(DecodeError::Malformed("zero-length option"));
            }
            if data.len() < len {
                return Err(DecodeError::Malformed("truncated option"));
            }

            match kind {
                ND_OPT_SOURCE_LLA if len == 8 => {
                    options.source_lla = MacAddr::from_slice(&data[2..8]);
                }
                ND_OPT_TARGET_LLA if len == 8 => {
                    options.target_lla = MacAddr::from_slice(&data[2..8]);
                }
                ND_OPT_PREFIX_INFORMATION => {
                    if len != 32 {
                        return Err(DecodeError::Malformed("prefix information must be 32 bytes"));
                    }
                    options.prefixes.push(PrefixInformation {
                        prefix_len: data[2],
                        on_link: data[3] & 0x80 != 0,
                        autonomous: data[3] & 0x40 != 0,
                        valid_lifetime: u32::from_be_bytes(data[4..8].try_into().unwrap()),
                        preferred_lifetime: u32::from_be_bytes(data[8..12].try_into().unwrap()),
                        prefix: read_addr(&data[16..32]),
                    });
                }
                _ => {}
            }
            data = &data[len..];
        }

        Ok(options)
    }
}
