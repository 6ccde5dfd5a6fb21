extern crate crossbeam;
extern crate futures;

/// The fabric module defines how the engine sees the switch it serves: interface names,
/// switch ports, virtual subnets, and the collaborator traits (Transport, InterfaceResolver,
/// EventSink) that the surrounding controller implements. The engine never talks to the
/// network directly; every frame it synthesizes goes out through a Transport, and every
/// port-to-interface question goes through an InterfaceResolver.
pub mod fabric;

/// Events published when address-resolution traffic is observed: ARP requests and replies,
/// and MAC bindings that changed under us. Publication is best-effort and always happens
/// off the frame-delivery thread.
pub mod event;

pub mod error;

pub mod stats;

/// The completion worker runs caller continuations and event publication on a dedicated
/// thread so that a slow consumer can never stall packet processing.
pub mod worker;

/// ARP side: the ResolutionCoordinator issues broadcast requests, correlates observed
/// senders against pending resolutions, and maintains the MAC-binding cache.
pub mod arp;

/// IPv6 side: the NeighborDiscoveryEngine answers Neighbor and Router Solicitations from
/// current subnet configuration. It keeps no state between messages.
pub mod ndp;

#[cfg(test)]
pub(crate) mod testutil;
