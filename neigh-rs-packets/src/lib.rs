mod types;
pub use self::types::*;

mod error;
pub use self::error::*;

mod ethernet;
pub use self::ethernet::*;

mod arp;
pub use self::arp::*;

mod ipv6;
pub use self::ipv6::*;

mod icmpv6;
pub use self::icmpv6::*;

pub mod checksum;
