use crate::error::{ResolveError, TransmitError};
use crate::event::Event;
use crate::fabric::{
    CandidateInterface, EventSink, Ingress, InterfaceName, InterfaceResolver, Transport,
};
use crate::stats::DropCounters;
use crate::worker::CompletionWorker;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use neigh_rs_packets::{ArpMessage, ArpOp, EthernetFrame, MacAddr, ARP_ETHER_TYPE};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Future handed to resolve() callers. Clonable: every concurrent caller
/// for one address awaits the same underlying completion.
pub type SharedMacFuture = Shared<BoxFuture<'static, Result<MacAddr, ResolveError>>>;

/// One in-flight resolution. At most one live entry exists per target
/// address; later callers attach to `shared` instead of issuing duplicate
/// wire traffic.
struct PendingResolution {
    complete: oneshot::Sender<Result<MacAddr, ResolveError>>,
    shared: SharedMacFuture,
    created_at: Instant,
}

///
/// Issues ARP requests for virtual ports, correlates observed senders
/// against pending resolutions, and keeps the MAC-binding cache current.
///
/// `on_frame_received` runs on the dispatcher's delivery threads and may
/// be invoked concurrently; both maps sit behind their own lock and every
/// completion takes the oneshot sender out of the pending map first, so a
/// future can never complete twice. Caller continuations and event
/// publication run on the completion worker, never on the delivery thread.
///
pub struct ResolutionCoordinator {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn InterfaceResolver>,
    events: Arc<dyn EventSink>,
    pending: Mutex<HashMap<Ipv4Addr, PendingResolution>>,
    bindings: RwLock<HashMap<(InterfaceName, Ipv4Addr), MacAddr>>,
    worker: CompletionWorker,
    pub drops: DropCounters,
}

impl ResolutionCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn InterfaceResolver>,
        events: Arc<dyn EventSink>,
    ) -> ResolutionCoordinator {
        ResolutionCoordinator {
            transport,
            resolver,
            events,
            pending: Mutex::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            worker: CompletionWorker::spawn(64),
            drops: DropCounters::new(),
        }
    }

    ///
    /// Resolves `target` to a MAC address by broadcasting an ARP request
    /// out of every candidate interface, each using its own MAC/IPv4 as
    /// the sender. When a resolution for `target` is already pending the
    /// existing future is returned and nothing is transmitted.
    ///
    /// The future fails immediately only when no candidate managed to put
    /// a request on the wire; one successful send is enough to keep it
    /// pending, however many other candidates failed. There is no timeout:
    /// a request whose answer never arrives stays pending forever.
    ///
    pub fn resolve(
        &self,
        target: Ipv4Addr,
        candidates: &[CandidateInterface],
    ) -> SharedMacFuture {
        let shared = {
            let mut pending = self.pending.lock().unwrap();
            if let Some(entry) = pending.get(&target) {
                return entry.shared.clone();
            }

            let (complete, receiver) = oneshot::channel();
            let shared = async move {
                match receiver.await {
                    Ok(result) => result,
                    Err(oneshot::Canceled) => Err(ResolveError::Canceled),
                }
            }
            .boxed()
            .shared();

            pending.insert(
                target,
                PendingResolution {
                    complete,
                    shared: shared.clone(),
                    created_at: Instant::now(),
                },
            );
            shared
        };

        let mut failures: Vec<(InterfaceName, TransmitError)> = Vec::new();
        let mut sent = false;
        for candidate in candidates {
            let egress = match self.resolver.switch_port(&candidate.name) {
                Some(port) => port,
                None => {
                    failures.push((
                        candidate.name.clone(),
                        TransmitError("no switch port mapped".to_string()),
                    ));
                    continue;
                }
            };

            let request = ArpMessage::request(candidate.mac, candidate.ip, target);
            let frame = request.to_frame(MacAddr::BROADCAST);
            match self.transport.transmit(&frame.data, &egress) {
                Ok(()) => sent = true,
                Err(err) => {
                    warn!(
                        "arp request for {} via {} not sent: {}",
                        target, candidate.name, err
                    );
                    failures.push((candidate.name.clone(), err));
                }
            }
        }

        if !sent {
            // Nothing is on the wire, so nothing will ever answer; fail the
            // future now. A frame observed in the meantime may already have
            // taken the entry, in which case the resolution succeeded.
            if let Some(entry) = self.pending.lock().unwrap().remove(&target) {
                let _ = entry
                    .complete
                    .send(Err(ResolveError::AllSendsFailed(failures)));
            }
        }

        shared
    }

    ///
    /// Handles one punted frame. Non-ARP frames are ignored; malformed ARP
    /// is counted and dropped. A valid message from a mapped ingress port
    /// updates the MAC-binding cache (a changed binding fires MacChanged),
    /// publishes the per-opcode event, and completes a pending resolution
    /// for the sender address. Requests complete resolutions exactly like
    /// replies do: either way we have observed the sender's MAC.
    ///
    /// Runs on the delivery thread and never blocks on consumer code.
    ///
    pub fn on_frame_received(&self, bytes: &[u8], ingress: &Ingress) {
        let frame = match EthernetFrame::from_buffer(bytes.to_vec()) {
            Ok(frame) => frame,
            Err(err) => {
                self.drops.record_decode_error(&err);
                return;
            }
        };
        if frame.ether_type() != ARP_ETHER_TYPE {
            return;
        }

        let message = match ArpMessage::decode(&frame) {
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
                    "dropping arp from unmapped port {}/{}",
                    ingress.port.dpid, ingress.port.port_no
                );
                self.drops.unknown_port.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        self.update_binding(&interface, &message);

        let event = match message.op {
            ArpOp::Request => Event::ArpRequestReceived {
                interface,
                sender_ip: message.sender_ip,
                sender_mac: message.sender_mac,
                target_ip: message.target_ip,
                table_id: ingress.table_id,
            },
            ArpOp::Reply => Event::ArpResponseReceived {
                interface,
                sender_ip: message.sender_ip,
                sender_mac: message.sender_mac,
                target_ip: message.target_ip,
                table_id: ingress.table_id,
            },
        };
        self.publish(event);

        let entry = self.pending.lock().unwrap().remove(&message.sender_ip);
        if let Some(entry) = entry {
            debug!(
                "resolved {} to {} after {:?}",
                message.sender_ip,
                message.sender_mac,
                entry.created_at.elapsed()
            );
            let mac = message.sender_mac;
            if !self.worker.submit(Box::new(move || {
                let _ = entry.complete.send(Ok(mac));
            })) {
                self.drops.worker_overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Builds and transmits a unicast ARP reply out of `interface`.
    pub fn send_unicast_reply(
        &self,
        interface: &InterfaceName,
        src_ip: Ipv4Addr,
        src_mac: MacAddr,
        dst_ip: Ipv4Addr,
        dst_mac: MacAddr,
    ) -> Result<(), ResolveError> {
        let egress = self
            .resolver
            .switch_port(interface)
            .ok_or_else(|| ResolveError::UnresolvedInterface(interface.clone()))?;

        let reply = ArpMessage::reply(src_mac, src_ip, dst_mac, dst_ip);
        let frame = reply.to_frame(dst_mac);
        self.transport
            .transmit(&frame.data, &egress)
            .map_err(ResolveError::Transmit)
    }

    /// Cached MAC for an (interface, address) pair, if one was observed.
    pub fn binding(&self, interface: &InterfaceName, ip: Ipv4Addr) -> Option<MacAddr> {
        self.bindings
            .read()
            .unwrap()
            .get(&(interface.clone(), ip))
            .copied()
    }

    fn update_binding(&self, interface: &InterfaceName, message: &ArpMessage) {
        let previous = self
            .bindings
            .write()
            .unwrap()
            .insert((interface.clone(), message.sender_ip), message.sender_mac);

        if let Some(old_mac) = previous {
            if old_mac != message.sender_mac {
                self.publish(Event::MacChanged {
                    interface: interface.clone(),
                    ip: message.sender_ip,
                    old_mac,
                    new_mac: message.sender_mac,
                });
            }
        }
    }

    fn publish(&self, event: Event) {
        let events = Arc::clone(&self.events);
        if !self.worker.submit(Box::new(move || events.publish(event))) {
            self.drops.worker_overflow.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingSink, RecordingTransport, StaticResolver};
    use futures::executor::block_on;
    use futures::FutureExt;
    use std::thread;

    const PORT: crate::fabric::SwitchPort = crate::fabric::SwitchPort {
        dpid: 1,
        port_no: 7,
    };

    fn candidate() -> CandidateInterface {
        CandidateInterface {
            name: "vbr0/if-0".into(),
            mac: MacAddr::new([0x0A, 0, 0, 0, 0, 0x01]),
            ip: Ipv4Addr::new(10, 0, 0, 1),
        }
    }

    fn coordinator_with(
        transport: Arc<RecordingTransport>,
        sink: Arc<RecordingSink>,
    ) -> ResolutionCoordinator {
        let resolver = Arc::new(StaticResolver::new().with_port("vbr0/if-0", PORT));
        ResolutionCoordinator::new(transport, resolver, sink)
    }

    fn ingress() -> Ingress {
        Ingress {
            port: PORT,
            table_id: 3,
            metadata: None,
        }
    }

    fn reply_frame(sender_mac: MacAddr, sender_ip: Ipv4Addr) -> Vec<u8> {
        let reply = ArpMessage::reply(
            sender_mac,
            sender_ip,
            MacAddr::new([0x0A, 0, 0, 0, 0, 0x01]),
            Ipv4Addr::new(10, 0, 0, 1),
        );
        reply.to_frame(MacAddr::new([0x0A, 0, 0, 0, 0, 0x01])).data
    }

    fn request_frame(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
        let request = ArpMessage::request(sender_mac, sender_ip, target_ip);
        request.to_frame(MacAddr::BROADCAST).data
    }

    #[test]
    fn resolve_broadcasts_one_request_per_candidate() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));

        let future = coordinator.resolve(Ipv4Addr::new(10, 0, 0, 9), &[candidate()]);
        assert!(future.now_or_never().is_none());

        let sent = transport.transmitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, PORT);

        let frame = EthernetFrame::from_buffer(sent[0].0.clone()).unwrap();
        assert_eq!(frame.dest_mac(), MacAddr::BROADCAST);
        let request = ArpMessage::decode(&frame).unwrap();
        assert_eq!(request.op, ArpOp::Request);
        assert_eq!(request.target_ip, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(request.target_mac, MacAddr::ZERO);
        assert_eq!(request.sender_ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn second_resolve_attaches_to_the_pending_entry() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));
        let target = Ipv4Addr::new(10, 0, 0, 9);

        let first = coordinator.resolve(target, &[candidate()]);
        let second = coordinator.resolve(target, &[candidate()]);
        assert_eq!(transport.transmitted().len(), 1);

        let answered = MacAddr::new([0xDE, 0xAD, 0xBE, 0xEF, 0, 9]);
        coordinator.on_frame_received(&reply_frame(answered, target), &ingress());

        assert_eq!(block_on(first), Ok(answered));
        assert_eq!(block_on(second), Ok(answered));
    }

    #[test]
    fn resolve_after_completion_issues_fresh_wire_traffic() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));
        let target = Ipv4Addr::new(10, 0, 0, 9);

        let first = coordinator.resolve(target, &[candidate()]);
        coordinator
            .on_frame_received(&reply_frame(MacAddr::new([1, 1, 1, 1, 1, 1]), target), &ingress());
        block_on(first).unwrap();

        let _second = coordinator.resolve(target, &[candidate()]);
        assert_eq!(transport.transmitted().len(), 2);
    }

    // An observed request naming the pending sender satisfies the future,
    // not only a reply.
    #[test]
    fn pending_completed_by_observed_request() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));
        let target = Ipv4Addr::new(10, 0, 0, 9);
        let target_mac = MacAddr::new([2, 2, 2, 2, 2, 2]);

        let future = coordinator.resolve(target, &[candidate()]);
        let frame = request_frame(target_mac, target, Ipv4Addr::new(10, 0, 0, 1));
        coordinator.on_frame_received(&frame, &ingress());

        assert_eq!(block_on(future), Ok(target_mac));
    }

    #[test]
    fn all_candidates_failing_fails_the_future_immediately() {
        let transport = Arc::new(RecordingTransport::failing());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));

        let future = coordinator.resolve(Ipv4Addr::new(10, 0, 0, 9), &[candidate()]);
        match block_on(future) {
            Err(ResolveError::AllSendsFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, InterfaceName::from("vbr0/if-0"));
            }
            other => panic!("expected AllSendsFailed, got {:?}", other),
        }
    }

    #[test]
    fn empty_candidate_list_fails_immediately() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));

        let future = coordinator.resolve(Ipv4Addr::new(10, 0, 0, 9), &[]);
        assert_eq!(
            block_on(future),
            Err(ResolveError::AllSendsFailed(vec![]))
        );
    }

    #[test]
    fn one_successful_send_keeps_the_future_pending() {
        let transport = Arc::new(RecordingTransport::new());
        let resolver = Arc::new(StaticResolver::new().with_port("vbr0/if-0", PORT));
        let coordinator = ResolutionCoordinator::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            resolver,
            Arc::new(RecordingSink::new()),
        );

        let unmapped = CandidateInterface {
            name: "vbr1/if-9".into(),
            mac: MacAddr::new([0x0A, 0, 0, 0, 0, 0x02]),
            ip: Ipv4Addr::new(10, 0, 1, 1),
        };
        let future = coordinator.resolve(Ipv4Addr::new(10, 0, 0, 9), &[unmapped, candidate()]);

        assert_eq!(transport.transmitted().len(), 1);
        assert!(future.now_or_never().is_none());
    }

    #[test]
    fn bindings_update_and_mac_changes_fire_once() {
        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let coordinator = coordinator_with(transport, Arc::clone(&sink));
        let sender_ip = Ipv4Addr::new(10, 0, 0, 5);
        let first_mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let second_mac = MacAddr::new([6, 5, 4, 3, 2, 1]);

        coordinator.on_frame_received(&reply_frame(first_mac, sender_ip), &ingress());
        coordinator.on_frame_received(&reply_frame(first_mac, sender_ip), &ingress());
        coordinator.on_frame_received(&reply_frame(second_mac, sender_ip), &ingress());
        coordinator.worker.flush();

        assert_eq!(
            coordinator.binding(&"vbr0/if-0".into(), sender_ip),
            Some(second_mac)
        );

        let changes: Vec<Event> = sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, Event::MacChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![Event::MacChanged {
                interface: "vbr0/if-0".into(),
                ip: sender_ip,
                old_mac: first_mac,
                new_mac: second_mac,
            }]
        );
    }

    #[test]
    fn opcode_events_are_published() {
        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let coordinator = coordinator_with(transport, Arc::clone(&sink));

        let frame = request_frame(
            MacAddr::new([1, 2, 3, 4, 5, 6]),
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 1),
        );
        coordinator.on_frame_received(&frame, &ingress());
        coordinator.worker.flush();

        assert_eq!(
            sink.events(),
            vec![Event::ArpRequestReceived {
                interface: "vbr0/if-0".into(),
                sender_ip: Ipv4Addr::new(10, 0, 0, 5),
                sender_mac: MacAddr::new([1, 2, 3, 4, 5, 6]),
                target_ip: Ipv4Addr::new(10, 0, 0, 1),
                table_id: 3,
            }]
        );
    }

    #[test]
    fn frames_from_unmapped_ports_are_dropped_whole() {
        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let coordinator = coordinator_with(transport, Arc::clone(&sink));
        let target = Ipv4Addr::new(10, 0, 0, 9);

        let future = coordinator.resolve(target, &[candidate()]);
        let unmapped = Ingress {
            port: crate::fabric::SwitchPort { dpid: 9, port_no: 9 },
            table_id: 0,
            metadata: None,
        };
        coordinator.on_frame_received(&reply_frame(MacAddr::new([1, 1, 1, 1, 1, 1]), target), &unmapped);
        coordinator.worker.flush();

        assert!(future.now_or_never().is_none());
        assert_eq!(coordinator.drops.snapshot().unknown_port, 1);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn garbage_and_foreign_frames_are_ignored() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(transport, Arc::new(RecordingSink::new()));

        coordinator.on_frame_received(&[0xDE, 0xAD], &ingress());
        assert_eq!(coordinator.drops.snapshot().short_frame, 1);

        // IPv4 ether type: not ours, not an error either.
        let mut frame = EthernetFrame::empty();
        frame.set_ether_type(0x0800);
        coordinator.on_frame_received(&frame.data, &ingress());
        assert_eq!(coordinator.drops.snapshot().malformed, 0);
    }

    #[test]
    fn unicast_reply_goes_out_the_mapped_port() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(Arc::clone(&transport), Arc::new(RecordingSink::new()));
        let dst_mac = MacAddr::new([9, 8, 7, 6, 5, 4]);

        coordinator
            .send_unicast_reply(
                &"vbr0/if-0".into(),
                Ipv4Addr::new(10, 0, 0, 1),
                MacAddr::new([0x0A, 0, 0, 0, 0, 0x01]),
                Ipv4Addr::new(10, 0, 0, 5),
                dst_mac,
            )
            .unwrap();

        let sent = transport.transmitted();
        assert_eq!(sent.len(), 1);
        let frame = EthernetFrame::from_buffer(sent[0].0.clone()).unwrap();
        assert_eq!(frame.dest_mac(), dst_mac);
        let reply = ArpMessage::decode(&frame).unwrap();
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.target_mac, dst_mac);
    }

    #[test]
    fn unicast_reply_fails_fast_on_unmapped_interface() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = coordinator_with(transport, Arc::new(RecordingSink::new()));

        let err = coordinator
            .send_unicast_reply(
                &"vbr9/if-9".into(),
                Ipv4Addr::new(10, 0, 0, 1),
                MacAddr::ZERO,
                Ipv4Addr::new(10, 0, 0, 5),
                MacAddr::ZERO,
            )
            .unwrap_err();
        assert_eq!(err, ResolveError::UnresolvedInterface("vbr9/if-9".into()));
    }

    #[tokio::test(threaded_scheduler)]
    async fn concurrent_awaiters_share_one_request() {
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = Arc::new(coordinator_with(
            Arc::clone(&transport),
            Arc::new(RecordingSink::new()),
        ));
        let target = Ipv4Addr::new(10, 0, 0, 9);

        let mut handles = vec![];
        for _ in 0..4 {
            let future = coordinator.resolve(target, &[candidate()]);
            handles.push(tokio::spawn(future));
        }
        assert_eq!(transport.transmitted().len(), 1);

        // Answer from another thread, the way the dispatcher would.
        let answering = Arc::clone(&coordinator);
        let answered = MacAddr::new([0xCA, 0xFE, 0, 0, 0, 1]);
        thread::spawn(move || {
            answering.on_frame_received(&reply_frame(answered, target), &ingress());
        });

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(answered));
        }
    }
}
