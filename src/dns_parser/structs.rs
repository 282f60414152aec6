use crate::arena::{HeaderArena, Slot};
use crate::storage::{HeaderStorage, Record};

use super::{DnsLabel, Opcode, RRData, RecordType, ResponseCode};

pub const DNS_HEADER_LEN: usize = 12;

/// The packed second word of the DNS header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsFlags(pub u16);

impl DnsFlags {
    const RESPONSE: u16 = 0x8000;
    const AUTHORITATIVE: u16 = 0x0400;
    const TRUNCATED: u16 = 0x0200;
    const RECURSION_DESIRED: u16 = 0x0100;
    const RECURSION_AVAILABLE: u16 = 0x0080;
    const Z: u16 = 0x0040;
    const AUTHENTIC_DATA: u16 = 0x0020;
    const CHECKING_DISABLED: u16 = 0x0010;
    const OPCODE_MASK: u16 = 0x7800;
    const RESPONSE_CODE_MASK: u16 = 0x000f;

    /// QR: the message is a response rather than a query
    pub fn response(self) -> bool {
        self.0 & DnsFlags::RESPONSE != 0
    }

    pub fn opcode(self) -> Opcode {
        Opcode::from(((self.0 & DnsFlags::OPCODE_MASK) >> 11) as u8)
    }

    pub fn authoritative(self) -> bool {
        self.0 & DnsFlags::AUTHORITATIVE != 0
    }

    pub fn truncated(self) -> bool {
        self.0 & DnsFlags::TRUNCATED != 0
    }

    pub fn recursion_desired(self) -> bool {
        self.0 & DnsFlags::RECURSION_DESIRED != 0
    }

    pub fn recursion_available(self) -> bool {
        self.0 & DnsFlags::RECURSION_AVAILABLE != 0
    }

    /// Reserved bit, zero in every well-formed message
    pub fn z(self) -> bool {
        self.0 & DnsFlags::Z != 0
    }

    pub fn authentic_data(self) -> bool {
        self.0 & DnsFlags::AUTHENTIC_DATA != 0
    }

    pub fn checking_disabled(self) -> bool {
        self.0 & DnsFlags::CHECKING_DISABLED != 0
    }

    pub fn response_code(self) -> ResponseCode {
        ResponseCode::from((self.0 & DnsFlags::RESPONSE_CODE_MASK) as u8)
    }
}

/// Parsed DNS message
///
/// The counts are the ones read from the wire; encode writes the lengths of
/// the section lists instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsMessage {
    pub id: u16,
    pub flags: DnsFlags,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
    pub questions: Option<Slot<DnsQuery>>,
    pub answers: Option<Slot<DnsResourceRecord>>,
    pub nameservers: Option<Slot<DnsResourceRecord>>,
    pub additional: Option<Slot<DnsResourceRecord>>,
}

/// A parsed chunk of data in the Query section of the message
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsQuery {
    pub qname: Option<Slot<DnsLabel>>,
    pub qtype: u16,
    pub qclass: u16,
    pub next: Option<Slot<DnsQuery>>,
}

/// A single DNS record
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResourceRecord {
    pub name: Option<Slot<DnsLabel>>,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdlength: u16,
    pub data: RRData,
    pub next: Option<Slot<DnsResourceRecord>>,
}

impl DnsResourceRecord {
    pub fn record_type(&self) -> RecordType {
        RecordType::from_u16(self.rtype)
    }
}

/// Records that form a singly linked list inside their arena
pub trait Linked: Record {
    fn next_link(&self) -> Option<Slot<Self>>;
}

impl Linked for DnsQuery {
    fn next_link(&self) -> Option<Slot<DnsQuery>> {
        self.next
    }
}

impl Linked for DnsResourceRecord {
    fn next_link(&self) -> Option<Slot<DnsResourceRecord>> {
        self.next
    }
}

/// Walks a list of labels, questions or resource records
pub struct Iter<'a, T> {
    storage: &'a HeaderStorage,
    next: Option<Slot<T>>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(storage: &'a HeaderStorage, head: Option<Slot<T>>) -> Iter<'a, T> {
        Iter {
            storage,
            next: head,
        }
    }
}

impl<'a, T: Linked + 'a> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let slot = self.next?;
        let item = T::arena(self.storage).get(slot);
        self.next = item.next_link();
        Some(item)
    }
}

impl Record for DnsQuery {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<DnsQuery> {
        &storage.queries
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<DnsQuery> {
        &mut storage.queries
    }

    /// Releases the question and every question after it
    fn release(storage: &mut HeaderStorage, slot: Slot<DnsQuery>) {
        let mut next = Some(slot);
        while let Some(slot) = next {
            let query = *storage.queries.get(slot);
            if let Some(qname) = query.qname {
                DnsLabel::release(storage, qname);
            }
            storage.queries.release(slot);
            next = query.next;
        }
    }
}

impl Record for DnsResourceRecord {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<DnsResourceRecord> {
        &storage.records
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<DnsResourceRecord> {
        &mut storage.records
    }

    /// Releases the record and every record after it
    fn release(storage: &mut HeaderStorage, slot: Slot<DnsResourceRecord>) {
        let mut next = Some(slot);
        while let Some(slot) = next {
            let record = *storage.records.get(slot);
            for name in record.name.into_iter().chain(record.data.names()) {
                DnsLabel::release(storage, name);
            }
            storage.records.release(slot);
            next = record.next;
        }
    }
}

impl Record for DnsMessage {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<DnsMessage> {
        &storage.dns
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<DnsMessage> {
        &mut storage.dns
    }

    fn release(storage: &mut HeaderStorage, slot: Slot<DnsMessage>) {
        let message = *storage.dns.get(slot);
        if let Some(questions) = message.questions {
            DnsQuery::release(storage, questions);
        }
        for &section in &[message.answers, message.nameservers, message.additional] {
            if let Some(records) = section {
                DnsResourceRecord::release(storage, records);
            }
        }
        storage.dns.release(slot);
    }
}

impl HeaderStorage {
    pub fn query(&self, slot: Slot<DnsQuery>) -> &DnsQuery {
        self.queries.get(slot)
    }

    pub fn record(&self, slot: Slot<DnsResourceRecord>) -> &DnsResourceRecord {
        self.records.get(slot)
    }

    pub fn questions(&self, head: Option<Slot<DnsQuery>>) -> Iter<'_, DnsQuery> {
        Iter::new(self, head)
    }

    pub fn records(&self, head: Option<Slot<DnsResourceRecord>>) -> Iter<'_, DnsResourceRecord> {
        Iter::new(self, head)
    }
}
