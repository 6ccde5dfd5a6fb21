use crate::fabric::{AddressMode, Ingress, InterfaceName, InterfaceResolver, RaMode, Transport, VirtualSubnet};
use crate::stats::DropCounters;
use log::debug;
use neigh_rs_packets::{
    EthernetFrame, Icmpv6Message, Ipv6Packet, MacAddr, NeighborAdvertisement,
    NeighborSolicitation, PrefixInformation, RouterAdvertisement, ICMPV6_NEXT_HEADER,
    IPV6_ETHER_TYPE,
};
use std::net::Ipv6Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Current-Hop-Limit field advertised in every RA.
pub const RA_CUR_HOP_LIMIT: u8 = 0x40;
pub const RA_ROUTER_LIFETIME: u16 = 1800;
pub const RA_REACHABLE_TIME: u32 = 0;
pub const RA_RETRANS_TIMER: u32 = 0;

const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xFF02, 0, 0, 0, 0, 0, 0, 1);

///
/// Answers IPv6 Neighbor and Router Solicitations for virtual ports.
/// Stateless: every solicitation is answered independently from current
/// configuration, nothing is remembered between messages. Anything that
/// fails validation is counted and dropped without a reply; corrupted
/// solicitations never get answered.
///
pub struct NeighborDiscoveryEngine {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn InterfaceResolver>,
    pub drops: DropCounters,
}

impl NeighborDiscoveryEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn InterfaceResolver>,
    ) -> NeighborDiscoveryEngine {
        NeighborDiscoveryEngine {
            transport,
            resolver,
            drops: DropCounters::new(),
        }
    }

    pub fn on_frame_received(&self, bytes: &[u8], ingress: &Ingress) {
        let frame = match EthernetFrame::from_buffer(bytes.to_vec()) {
            Ok(frame) => frame,
            Err(err) => {
                self.drops.record_decode_error(&err);
                return;
            }
        };
        if frame.ether_type() != IPV6_ETHER_TYPE {
            return;
        }
        let src_mac = frame.src_mac();
        let packet_offset = frame.payload_offset;

        let packet = match Ipv6Packet::from_buffer(frame.data, packet_offset) {
            Ok(packet) => packet,
            Err(err) => {
                self.drops.record_decode_error(&err);
                return;
            }
        };
        if packet.next_header() != ICMPV6_NEXT_HEADER {
            self.drops.non_icmpv6.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let src = packet.src_addr();
        let dst = packet.dest_addr();
        let message = match Icmpv6Message::decode(src, dst, &packet.payload()) {
            Ok(message) => message,
            Err(err) => {
                self.drops.record_decode_error(&err);
                return;
            }
        };

        let interface = match self
            .resolver
            .interface_for_ingress(&ingress.port, ingress.metadata)
        {
            Some(interface) => interface,
            None => {
                debug!(
                    "dropping icmpv6 from unmapped port {}/{}",
                    ingress.port.dpid, ingress.port.port_no
                );
                self.drops.unknown_port.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match message {
            Icmpv6Message::NeighborSolicitation(solicitation) => {
                self.answer_neighbor_solicitation(&solicitation, src, src_mac, ingress)
            }
            Icmpv6Message::RouterSolicitation(_) => {
                self.answer_router_solicitation(&interface, src, src_mac, ingress)
            }
            // Advertisements are informational; nothing to synthesize.
            Icmpv6Message::NeighborAdvertisement(_) | Icmpv6Message::RouterAdvertisement(_) => {}
        }
    }

    fn answer_neighbor_solicitation(
        &self,
        solicitation: &NeighborSolicitation,
        src: Ipv6Addr,
        src_mac: MacAddr,
        ingress: &Ingress,
    ) {
        let (owner, owner_mac) = match self.resolver.ipv6_owner(&solicitation.target) {
            Some(found) => found,
            None => {
                self.drops.unknown_target.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        // Duplicate-address-detection probes arrive from the unspecified
        // address and cannot be answered unicast.
        let (dst_ip, dst_mac) = if src.is_unspecified() {
            (ALL_NODES, MacAddr::ipv6_multicast(&ALL_NODES))
        } else {
            (src, src_mac)
        };

        let advertisement = Icmpv6Message::NeighborAdvertisement(NeighborAdvertisement {
            router: true,
            solicited: true,
            override_cache: true,
            target: solicitation.target,
            target_lla: Some(owner_mac),
        });
        let body = advertisement.encode(solicitation.target, dst_ip);
        let packet = Ipv6Packet::new(solicitation.target, dst_ip, ICMPV6_NEXT_HEADER, 255, &body);
        let reply = packet.to_frame(owner_mac, dst_mac);

        if let Err(err) = self.transport.transmit(&reply.data, &ingress.port) {
            debug!("neighbor advertisement for {} not sent: {}", owner, err);
        }
    }

    fn answer_router_solicitation(
        &self,
        interface: &InterfaceName,
        src: Ipv6Addr,
        src_mac: MacAddr,
        ingress: &Ingress,
    ) {
        let subnets = self.resolver.subnets(interface);
        let advertised: Vec<&VirtualSubnet> = subnets
            .iter()
            .filter(|subnet| subnet.ra_mode == RaMode::Advertised)
            .collect();
        if advertised.is_empty() {
            self.drops.no_subnets.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let (router_mac, router_ip) = match self.resolver.router_source(interface) {
            Some(found) => found,
            None => {
                self.drops.no_router_source.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let (managed, other) = ra_flags(&advertised);
        let prefixes = advertised
            .iter()
            .map(|subnet| PrefixInformation {
                prefix_len: subnet.prefix_len,
                on_link: true,
                autonomous: subnet.address_mode != AddressMode::DhcpStateful,
                valid_lifetime: subnet.valid_lifetime,
                preferred_lifetime: subnet.preferred_lifetime,
                prefix: subnet.prefix,
            })
            .collect();

        let advertisement = Icmpv6Message::RouterAdvertisement(RouterAdvertisement {
            cur_hop_limit: RA_CUR_HOP_LIMIT,
            managed,
            other,
            router_lifetime: RA_ROUTER_LIFETIME,
            reachable_time: RA_REACHABLE_TIME,
            retrans_timer: RA_RETRANS_TIMER,
            source_lla: Some(router_mac),
            prefixes,
        });

        // A solicitation from the unspecified address cannot be answered
        // unicast; fall back to the all-nodes group.
        let (dst_ip, dst_mac) = if src.is_unspecified() {
            (ALL_NODES, MacAddr::ipv6_multicast(&ALL_NODES))
        } else {
            (src, src_mac)
        };

        let body = advertisement.encode(router_ip, dst_ip);
        let packet = Ipv6Packet::new(router_ip, dst_ip, ICMPV6_NEXT_HEADER, 255, &body);
        let reply = packet.to_frame(router_mac, dst_mac);

        if let Err(err) = self.transport.transmit(&reply.data, &ingress.port) {
            debug!("router advertisement on {} not sent: {}", interface, err);
        }
    }
}

/// The most-stateful advertised mode present decides the RA-level flags.
fn ra_flags(subnets: &[&VirtualSubnet]) -> (bool, bool) {
    subnets
        .iter()
        .map(|subnet| subnet.address_mode)
        .max()
        .map(AddressMode::ra_flags)
        .unwrap_or((false, false))
}
