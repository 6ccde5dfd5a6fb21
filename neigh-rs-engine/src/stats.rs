use log::debug;
use neigh_rs_packets::DecodeError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Frame-drop accounting. An inbound error is counted, logged, and
/// swallowed; a malformed or adversarial packet must never escape the
/// frame-delivery path. Repeated drops on one port are an observability
/// signal, not a circuit breaker.
#[derive(Debug, Default)]
pub struct DropCounters {
    pub short_frame: AtomicU64,
    pub malformed: AtomicU64,
    pub bad_checksum: AtomicU64,
    pub unsupported_type: AtomicU64,
    pub unknown_port: AtomicU64,
    pub non_icmpv6: AtomicU64,
    pub unknown_target: AtomicU64,
    pub no_subnets: AtomicU64,
    pub no_router_source: AtomicU64,
    pub worker_overflow: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropSnapshot {
    pub short_frame: u64,
    pub malformed: u64,
    pub bad_checksum: u64,
    pub unsupported_type: u64,
    pub unknown_port: u64,
    pub non_icmpv6: u64,
    pub unknown_target: u64,
    pub no_subnets: u64,
    pub no_router_source: u64,
    pub worker_overflow: u64,
}

impl DropCounters {
    pub fn new() -> DropCounters {
        Default::default()
    }

    pub fn record_decode_error(&self, err: &DecodeError) {
        debug!("dropping frame: {}", err);
        let counter = match err {
            DecodeError::ShortFrame => &self.short_frame,
            DecodeError::Malformed(_) => &self.malformed,
            DecodeError::InvalidChecksum => &self.bad_checksum,
            DecodeError::UnsupportedType(_) => &self.unsupported_type,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DropSnapshot {
        DropSnapshot {
            short_frame: self.short_frame.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            bad_checksum: self.bad_checksum.load(Ordering::Relaxed),
            unsupported_type: self.unsupported_type.load(Ordering::Relaxed),
            unknown_port: self.unknown_port.load(Ordering::Relaxed),
            non_icmpv6: self.non_icmpv6.load(Ordering::Relaxed),
            unknown_target: self.unknown_target.load(Ordering::Relaxed),
            no_subnets: self.no_subnets.load(Ordering::Relaxed),
            no_router_source: self.no_router_source.load(Ordering::Relaxed),
            worker_overflow: self.worker_overflow.load(Ordering::Relaxed),
        }
    }
}
