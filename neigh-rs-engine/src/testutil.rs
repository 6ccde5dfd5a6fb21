use crate::error::TransmitError;
use crate::event::Event;
use crate::fabric::{
    EventSink, InterfaceName, InterfaceResolver, SwitchPort, Transport, VirtualSubnet,
};
use neigh_rs_packets::MacAddr;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Mutex;

/// Captures every frame handed to it instead of talking to a switch.
pub struct RecordingTransport {
    frames: Mutex<Vec<(Vec<u8>, SwitchPort)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> RecordingTransport {
        RecordingTransport {
            frames: Mutex::new(vec![]),
            fail: false,
        }
    }

    /// A transport that rejects every send.
    pub fn failing() -> RecordingTransport {
        RecordingTransport {
            frames: Mutex::new(vec![]),
            fail: true,
        }
    }

    pub fn transmitted(&self) -> Vec<(Vec<u8>, SwitchPort)> {
        self.frames.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn transmit(&self, frame: &[u8], egress: &SwitchPort) -> Result<(), TransmitError> {
        if self.fail {
            return Err(TransmitError("send rejected".to_string()));
        }
        self.frames.lock().unwrap().push((frame.to_vec(), *egress));
        Ok(())
    }
}

pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> RecordingSink {
        RecordingSink {
            events: Mutex::new(vec![]),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Fixed-table resolver built up with the `with_*` methods.
pub struct StaticResolver {
    ports: HashMap<InterfaceName, SwitchPort>,
    subnets: HashMap<InterfaceName, Vec<VirtualSubnet>>,
    owners: HashMap<Ipv6Addr, (InterfaceName, MacAddr)>,
    routers: HashMap<InterfaceName, (MacAddr, Ipv6Addr)>,
}

impl StaticResolver {
    pub fn new() -> StaticResolver {
        StaticResolver {
            ports: HashMap::new(),
            subnets: HashMap::new(),
            owners: HashMap::new(),
            routers: HashMap::new(),
        }
    }

    pub fn with_port(mut self, name: &str, port: SwitchPort) -> StaticResolver {
        self.ports.insert(name.into(), port);
        self
    }

    pub fn with_subnets(mut self, name: &str, subnets: Vec<VirtualSubnet>) -> StaticResolver {
        self.subnets.insert(name.into(), subnets);
        self
    }

    pub fn with_owner(mut self, target: Ipv6Addr, name: &str, mac: MacAddr) -> StaticResolver {
        self.owners.insert(target, (name.into(), mac));
        self
    }

    pub fn with_router(mut self, name: &str, mac: MacAddr, link_local: Ipv6Addr) -> StaticResolver {
        self.routers.insert(name.into(), (mac, link_local));
        self
    }
}

impl InterfaceResolver for StaticResolver {
    fn interface_for_ingress(
        &self,
        port: &SwitchPort,
        _metadata: Option<u64>,
    ) -> Option<InterfaceName> {
        self.ports
            .iter()
            .find(|(_, mapped)| **mapped == *port)
            .map(|(name, _)| name.clone())
    }

    fn switch_port(&self, interface: &InterfaceName) -> Option<SwitchPort> {
        self.ports.get(interface).copied()
    }

    fn subnets(&self, interface: &InterfaceName) -> Vec<VirtualSubnet> {
        self.subnets.get(interface).cloned().unwrap_or_default()
    }

    fn ipv6_owner(&self, target: &Ipv6Addr) -> Option<(InterfaceName, MacAddr)> {
        self.owners.get(target).cloned()
    }

    fn router_source(&self, interface: &InterfaceName) -> Option<(MacAddr, Ipv6Addr)> {
        self.routers.get(interface).copied()
    }
}
