use crate::error::TransmitError;
use crate::event::Event;
use neigh_rs_packets::MacAddr;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Logical attachment point on a virtual bridge, e.g. "vbr0/if-3".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceName(pub String);

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InterfaceName {
    fn from(name: &str) -> InterfaceName {
        InterfaceName(name.to_string())
    }
}

/// Physical location of a virtual port in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchPort {
    pub dpid: u64,
    pub port_no: u32,
}

/// Punt context delivered alongside every frame the switch sends up.
#[derive(Debug, Clone, Copy)]
pub struct Ingress {
    pub port: SwitchPort,
    pub table_id: u8,
    pub metadata: Option<u64>,
}

/// How hosts on a subnet obtain addresses. Ordered by statefulness; the
/// most-stateful advertised subnet decides the RA-level M/O flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddressMode {
    Slaac,
    DhcpStateless,
    DhcpStateful,
}

impl AddressMode {
    /// The RA-level (managed, other) flag pair this mode advertises.
    pub fn ra_flags(self) -> (bool, bool) {
        match self {
            AddressMode::Slaac => (false, false),
            AddressMode::DhcpStateless => (false, true),
            AddressMode::DhcpStateful => (true, false),
        }
    }
}

/// Whether a subnet appears in synthesized Router Advertisements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaMode {
    Advertised,
    Suppressed,
}

/// Read-only subnet configuration. List order on the owning interface is
/// Prefix-Information option order in a synthesized RA.
#[derive(Debug, Clone)]
pub struct VirtualSubnet {
    pub gateway_ip: Ipv6Addr,
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub address_mode: AddressMode,
    pub ra_mode: RaMode,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

impl VirtualSubnet {
    /// Advertised subnet with the RFC 4861 default lifetimes.
    pub fn new(
        gateway_ip: Ipv6Addr,
        prefix: Ipv6Addr,
        prefix_len: u8,
        address_mode: AddressMode,
    ) -> VirtualSubnet {
        VirtualSubnet {
            gateway_ip,
            prefix,
            prefix_len,
            address_mode,
            ra_mode: RaMode::Advertised,
            valid_lifetime: 2_592_000,
            preferred_lifetime: 604_800,
        }
    }
}

/// An interface eligible to source an ARP request; its own MAC and IPv4
/// address become the sender fields of the broadcast request.
#[derive(Debug, Clone)]
pub struct CandidateInterface {
    pub name: InterfaceName,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

/// Hands a synthesized frame to the switch. Fire-and-forget: once a frame
/// is accepted for transmission its fate is invisible, only a send that
/// could not be attempted at all reports an error.
pub trait Transport: Send + Sync {
    fn transmit(&self, frame: &[u8], egress: &SwitchPort) -> Result<(), TransmitError>;
}

/// Maps between ports, interfaces, and their configuration. Implemented by
/// the surrounding controller over its datastore.
pub trait InterfaceResolver: Send + Sync {
    /// Interface behind an ingress port, if the port maps to a configured
    /// virtual port. `metadata` carries the flow-match metadata punted with
    /// the frame, when the fabric provides one.
    fn interface_for_ingress(&self, port: &SwitchPort, metadata: Option<u64>)
        -> Option<InterfaceName>;

    fn switch_port(&self, interface: &InterfaceName) -> Option<SwitchPort>;

    /// Subnets configured on an interface, in advertisement order.
    fn subnets(&self, interface: &InterfaceName) -> Vec<VirtualSubnet>;

    /// Owner of a solicited IPv6 target address, with the MAC to advertise.
    fn ipv6_owner(&self, target: &Ipv6Addr) -> Option<(InterfaceName, MacAddr)>;

    /// MAC and link-local source address for Router Advertisements sent
    /// from an interface.
    fn router_source(&self, interface: &InterfaceName) -> Option<(MacAddr, Ipv6Addr)>;
}

/// Best-effort event publication; implementations may be slow, the engine
/// never calls this on the frame-delivery thread.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}
