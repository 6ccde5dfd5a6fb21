use std::fmt;
use std::net::Ipv6Addr;

pub const ARP_ETHER_TYPE: u16 = 0x0806;
pub const IPV6_ETHER_TYPE: u16 = 0x86DD;

/// IPv6 next-header value carried by every ICMPv6 message.
pub const ICMPV6_NEXT_HEADER: u8 = 58;

//Most significant byte is 0th
#[derive(Eq, Clone, Copy, Hash, PartialEq, Debug)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr {
        bytes: [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    };

    pub const ZERO: MacAddr = MacAddr {
        bytes: [0, 0, 0, 0, 0, 0],
    };

    pub fn new(bytes: [u8; 6]) -> MacAddr {
        MacAddr { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<MacAddr> {
        if slice.len() != 6 {
            return None;
        }
        let mut bytes = [0; 6];
        bytes.copy_from_slice(slice);
        Some(MacAddr { bytes })
    }

    pub fn is_multicast(&self) -> bool {
        self.bytes[0] & 0x01 != 0
    }

    /// Ethernet destination for an IPv6 multicast group (RFC 2464 section 7):
    /// 33:33 followed by the low four bytes of the group address.
    pub fn ipv6_multicast(group: &Ipv6Addr) -> MacAddr {
        let octets = group.octets();
        MacAddr {
            bytes: [0x33, 0x33, octets[12], octets[13], octets[14], octets[15]],
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}
