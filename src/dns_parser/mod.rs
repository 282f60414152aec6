//! DNS messages stored in header arenas
//!
//! Use [`HeaderStorage::questions`] and [`HeaderStorage::records`] to walk the
//! sections of a decoded [`DnsMessage`], and [`HeaderStorage::domain_name`] to
//! turn a label chain into text.

mod builder;
mod enums;
mod name;
mod parser;
mod rrdata;
mod structs;

pub use self::enums::{Opcode, RecordType, ResponseCode};
pub use self::name::{DnsLabel, MAX_LABEL_LEN, MAX_NAME_LEN};
pub use self::rrdata::RRData;
pub use self::structs::{
    DnsFlags, DnsMessage, DnsQuery, DnsResourceRecord, Iter, Linked, DNS_HEADER_LEN,
};

use crate::arena::Slot;
use crate::header::{Header, HeaderKind, HeaderRef};
use crate::storage::HeaderStorage;
use crate::udp::PseudoHeader;
use crate::{Error, RawFrame};

impl Header for DnsMessage {
    const KIND: HeaderKind = HeaderKind::Dns;

    fn decode(
        storage: &mut HeaderStorage,
        frame: &RawFrame,
        offset: usize,
        _pseudo: Option<PseudoHeader>,
    ) -> Result<Slot<DnsMessage>, Error> {
        parser::decode_message(storage, frame, offset)
    }

    fn encode(
        &self,
        storage: &HeaderStorage,
        frame: &mut RawFrame,
        offset: usize,
        _pseudo: Option<PseudoHeader>,
    ) -> Result<usize, Error> {
        builder::encode_message(self, storage, frame, offset)
    }

    /// The whole message, written uncompressed
    fn wire_size(&self, storage: &HeaderStorage) -> usize {
        builder::message_len(self, storage)
    }

    fn next(&self) -> Option<HeaderRef> {
        None
    }

    fn wrap(slot: Slot<DnsMessage>) -> HeaderRef {
        HeaderRef::Dns(slot)
    }

    fn from_ref(header: HeaderRef) -> Option<Slot<DnsMessage>> {
        match header {
            HeaderRef::Dns(slot) => Some(slot),
            _ => None,
        }
    }
}
