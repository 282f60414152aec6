//! The protocol header chain.
//!
//! ```text
//!  |_____________________|
//!  |                     |
//!  |     Next Header     | Layer n + 1
//!  |_____________________|
//!  |                     |
//!  |       Header        | Layer n
//!  |_____________________|
//! ```
//!
//! Every layer implements [`Header`]; a [`HeaderRef`] is the type tag plus
//! the arena slot of one header and is what links a header to its payload.

use std::fmt;

use crate::arena::Slot;
use crate::dns_parser::DnsMessage;
use crate::ethernet::EthernetHeader;
use crate::ipv4::Ipv4Header;
use crate::storage::{HeaderStorage, Record};
use crate::udp::{PseudoHeader, UdpHeader};
use crate::{Error, RawFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    Ethernet,
    Ipv4,
    Udp,
    Dns,
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            HeaderKind::Ethernet => "Ethernet",
            HeaderKind::Ipv4 => "IPv4",
            HeaderKind::Udp => "UDP",
            HeaderKind::Dns => "DNS",
        })
    }
}

/// Outcome of checking a stored checksum while decoding.
///
/// A mismatch never changes dispatch; it is kept on the header so that
/// callers can see it (see `HeaderStorage::verify_checksums`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Not enough context to check, or never decoded
    Unverified,
    Valid,
    Mismatch { computed: u16 },
    /// UDP checksum of zero: the sender did not compute one
    Disabled,
}

impl Default for ChecksumStatus {
    fn default() -> ChecksumStatus {
        ChecksumStatus::Unverified
    }
}

/// One protocol layer: decode, encode, release and size on the wire
pub trait Header: Record {
    const KIND: HeaderKind;

    /// Reads the header at `offset` and, recursively, its payload.
    ///
    /// On failure everything allocated by this call has been released.
    fn decode(
        storage: &mut HeaderStorage,
        frame: &RawFrame,
        offset: usize,
        pseudo: Option<PseudoHeader>,
    ) -> Result<Slot<Self>, Error>;

    /// Writes the payload first, then the header at `offset`. Returns the
    /// number of bytes written for header and payload.
    fn encode(
        &self,
        storage: &HeaderStorage,
        frame: &mut RawFrame,
        offset: usize,
        pseudo: Option<PseudoHeader>,
    ) -> Result<usize, Error>;

    /// Bytes this header alone takes on the wire
    fn wire_size(&self, storage: &HeaderStorage) -> usize;

    fn next(&self) -> Option<HeaderRef>;

    fn wrap(slot: Slot<Self>) -> HeaderRef;

    fn from_ref(header: HeaderRef) -> Option<Slot<Self>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRef {
    Ethernet(Slot<EthernetHeader>),
    Ipv4(Slot<Ipv4Header>),
    Udp(Slot<UdpHeader>),
    Dns(Slot<DnsMessage>),
}

macro_rules! dispatch {
    ($header:expr, $slot:ident => $body:expr) => {
        match $header {
            HeaderRef::Ethernet($slot) => $body,
            HeaderRef::Ipv4($slot) => $body,
            HeaderRef::Udp($slot) => $body,
            HeaderRef::Dns($slot) => $body,
        }
    };
}

fn get<H: Header>(storage: &HeaderStorage, slot: Slot<H>) -> &H {
    H::arena(storage).get(slot)
}

fn kind_of<H: Header>(_: Slot<H>) -> HeaderKind {
    H::KIND
}

fn release<H: Header>(storage: &mut HeaderStorage, slot: Slot<H>) {
    H::release(storage, slot)
}

impl HeaderRef {
    pub fn kind(self) -> HeaderKind {
        dispatch!(self, slot => kind_of(slot))
    }

    pub fn next(self, storage: &HeaderStorage) -> Option<HeaderRef> {
        dispatch!(self, slot => get(storage, slot).next())
    }

    pub fn wire_size(self, storage: &HeaderStorage) -> usize {
        dispatch!(self, slot => get(storage, slot).wire_size(storage))
    }

    pub(crate) fn encode(
        self,
        storage: &HeaderStorage,
        frame: &mut RawFrame,
        offset: usize,
        pseudo: Option<PseudoHeader>,
    ) -> Result<usize, Error> {
        dispatch!(self, slot => get(storage, slot).encode(storage, frame, offset, pseudo))
    }

    pub(crate) fn release(self, storage: &mut HeaderStorage) {
        dispatch!(self, slot => release(storage, slot))
    }
}

/// Releases the payload chain of a header, then its own slot
pub(crate) fn release_header<H: Header>(storage: &mut HeaderStorage, slot: Slot<H>) {
    if let Some(next) = H::arena(storage).get(slot).next() {
        next.release(storage);
    }
    H::arena_mut(storage).release(slot);
}
