pub mod checksum;
pub mod icmp;
pub mod socket;

pub use checksum::*;
pub use icmp::*;
pub use socket::*;
