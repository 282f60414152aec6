use std::net::Ipv4Addr;

use crate::arena::Slot;

use super::{DnsLabel, RecordType};

/// The enumeration that represents known types of DNS resource records data
///
/// Names are label chains owned by the record; releasing the record
/// releases them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RRData {
    A(Ipv4Addr),
    NS(Slot<DnsLabel>),
    CNAME(Slot<DnsLabel>),
    PTR(Slot<DnsLabel>),
    SOA {
        mname: Slot<DnsLabel>,
        rname: Slot<DnsLabel>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    MX {
        preference: u16,
        exchange: Slot<DnsLabel>,
    },
    /// EDNS(0) options, only the length is kept
    OPT,
    // Anything that can't be parsed yet
    Unknown,
}

impl Default for RRData {
    fn default() -> RRData {
        RRData::Unknown
    }
}

impl RRData {
    /// The record type this data is encoded as, `None` for unknown types
    pub fn typ(&self) -> Option<RecordType> {
        Some(match *self {
            RRData::A(..) => RecordType::A,
            RRData::NS(..) => RecordType::NS,
            RRData::CNAME(..) => RecordType::CNAME,
            RRData::PTR(..) => RecordType::PTR,
            RRData::SOA { .. } => RecordType::SOA,
            RRData::MX { .. } => RecordType::MX,
            RRData::OPT => RecordType::OPT,
            RRData::Unknown => return None,
        })
    }

    /// Label chains referenced by this data
    pub fn names(self) -> impl Iterator<Item = Slot<DnsLabel>> {
        let (first, second) = match self {
            RRData::NS(name) | RRData::CNAME(name) | RRData::PTR(name) => (Some(name), None),
            RRData::MX { exchange, .. } => (Some(exchange), None),
            RRData::SOA { mname, rname, .. } => (Some(mname), Some(rname)),
            RRData::A(..) | RRData::OPT | RRData::Unknown => (None, None),
        };
        first.into_iter().chain(second)
    }
}
