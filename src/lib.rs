//! Packet interpretation for a DNS defense tool.
//!
//! A captured link-layer frame is decoded into a chain of headers,
//! Ethernet (optionally VLAN tagged) → IPv4 → UDP → DNS, each allocated from
//! a per-type arena in a [`HeaderStorage`]. The chain can be encoded back
//! into a frame with lengths and checksums recomputed.
//!
//! ```
//! use dns_defender::{HeaderStorage, RawFrame};
//!
//! let bytes = b"\x00\x15\x17\x0e\x61\xa2\x00\x03\x6c\xb3\x54\x1b\x08\x00\
//!     \x45\x00\x00\x38\xfa\xd6\x00\x00\xf3\x11\x92\x32\xbc\x5f\x1d\xb1\xc3\x86\x9d\x14\
//!     \xd5\x03\x00\x35\x00\x24\x00\x00\
//!     \x46\x14\x01\x00\x00\x01\x00\x00\x00\x00\x00\x01\
//!     \x00\x00\xff\x00\x01\
//!     \x00\x00\x29\x23\x28\x00\x00\x00\x00\x00\x00";
//!
//! let mut storage = HeaderStorage::new();
//! let frame = RawFrame::from_slice(bytes)?;
//! let packet = storage.decode(&frame)?;
//!
//! let dns = storage.dns(&packet).unwrap();
//! assert_eq!(dns.id, 0x4614);
//! for question in storage.questions(dns.questions) {
//!     assert_eq!(storage.domain_name(question.qname), ".");
//! }
//!
//! storage.release(packet);
//! # Ok::<(), dns_defender::Error>(())
//! ```

mod address;
mod arena;
pub mod checksum;
mod defender;
pub mod dns_parser;
mod error;
pub mod ethernet;
mod frame;
mod header;
pub mod ipv4;
mod packet;
mod storage;
pub mod udp;

pub use crate::address::{
    Ipv4Addr, Ipv6Addr, MacAddress, IPV4_ADDRESS_LEN, IPV6_ADDRESS_LEN, MAC_ADDRESS_LEN,
};
pub use crate::arena::{HeaderArena, Slot};
pub use crate::defender::{Defender, FrameSource, Observation, PumpStats, Question};
pub use crate::error::Error;
pub use crate::frame::{RawFrame, MAX_FRAME_SIZE};
pub use crate::header::{ChecksumStatus, Header, HeaderKind, HeaderRef};
pub use crate::packet::{Packet, PacketRecord};
pub use crate::storage::{ArenaStats, HeaderStorage, Record, StorageConfig};
