use crate::fabric::InterfaceName;
use neigh_rs_packets::MacAddr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ArpRequestReceived {
        interface: InterfaceName,
        sender_ip: Ipv4Addr,
        sender_mac: MacAddr,
        target_ip: Ipv4Addr,
        table_id: u8,
    },
    ArpResponseReceived {
        interface: InterfaceName,
        sender_ip: Ipv4Addr,
        sender_mac: MacAddr,
        target_ip: Ipv4Addr,
        table_id: u8,
    },
    /// The MAC observed for an (interface, address) pair differs from the
    /// cached binding.
    MacChanged {
        interface: InterfaceName,
        ip: Ipv4Addr,
        old_mac: MacAddr,
        new_mac: MacAddr,
    },
}
