use crate::fabric::InterfaceName;
use std::error::Error;
use std::fmt;

/// A send that could not be attempted. Post-send failures are invisible by
/// design; a dropped frame shows up only as a resolution that never
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitError(pub String);

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "transmit failed: {}", self.0)
    }
}

impl Error for TransmitError {}

/// Outbound failure modes. Clonable because resolution futures are shared
/// between every caller waiting on the same address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The interface has no switch port behind it.
    UnresolvedInterface(InterfaceName),
    /// Not one candidate interface managed to put a request on the wire.
    AllSendsFailed(Vec<(InterfaceName, TransmitError)>),
    /// A single send failed before it could be attempted.
    Transmit(TransmitError),
    /// The coordinator went away while the resolution was pending.
    Canceled,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::UnresolvedInterface(interface) => {
                write!(f, "no switch port mapped for interface {}", interface)
            }
            ResolveError::AllSendsFailed(failures) => write!(
                f,
                "every candidate interface failed to send ({} candidates)",
                failures.len()
            ),
            ResolveError::Transmit(err) => err.fmt(f),
            ResolveError::Canceled => write!(f, "resolution canceled"),
        }
    }
}

impl Error for ResolveError {}
