use crate::arena::Slot;
use crate::header::HeaderKind;
use crate::storage::HeaderStorage;
use crate::{Error, RawFrame};

use super::name::{name_wire_len, write_name};
use super::{DnsMessage, DnsResourceRecord, RRData, DNS_HEADER_LEN};

/// Writes `message` at `offset` and returns its length.
///
/// Names are written uncompressed and the section counts are the lengths of
/// the section lists, so the output can differ from the bytes the message was
/// decoded from.
pub(crate) fn encode_message(
    message: &DnsMessage,
    storage: &HeaderStorage,
    frame: &mut RawFrame,
    offset: usize,
) -> Result<usize, Error> {
    let mut cursor = offset + DNS_HEADER_LEN;

    let mut questions = 0u16;
    for query in storage.questions(message.questions) {
        cursor = write_name(storage, frame, cursor, query.qname)?;
        frame.write_u16(cursor, query.qtype)?;
        frame.write_u16(cursor + 2, query.qclass)?;
        cursor += 4;
        questions = questions.wrapping_add(1);
    }
    let answers = write_section(storage, frame, &mut cursor, message.answers)?;
    let nameservers = write_section(storage, frame, &mut cursor, message.nameservers)?;
    let additional = write_section(storage, frame, &mut cursor, message.additional)?;

    frame.write_u16(offset, message.id)?;
    frame.write_u16(offset + 2, message.flags.0)?;
    frame.write_u16(offset + 4, questions)?;
    frame.write_u16(offset + 6, answers)?;
    frame.write_u16(offset + 8, nameservers)?;
    frame.write_u16(offset + 10, additional)?;

    Ok(cursor - offset)
}

fn write_section(
    storage: &HeaderStorage,
    frame: &mut RawFrame,
    cursor: &mut usize,
    head: Option<Slot<DnsResourceRecord>>,
) -> Result<u16, Error> {
    let mut count = 0u16;
    for record in storage.records(head) {
        *cursor = write_rr(storage, frame, *cursor, record)?;
        count = count.wrapping_add(1);
    }
    Ok(count)
}

fn write_rr(
    storage: &HeaderStorage,
    frame: &mut RawFrame,
    cursor: usize,
    record: &DnsResourceRecord,
) -> Result<usize, Error> {
    let mut cursor = write_name(storage, frame, cursor, record.name)?;
    frame.write_u16(cursor, record.rtype)?;
    frame.write_u16(cursor + 2, record.class)?;
    frame.write_u32(cursor + 4, record.ttl)?;
    let size_offset = cursor + 8;
    cursor += 10;

    let data_offset = cursor;
    match record.data {
        RRData::A(address) => {
            frame.write_u32(cursor, u32::from(address))?;
            cursor += 4;
        }
        RRData::NS(name) | RRData::CNAME(name) | RRData::PTR(name) => {
            cursor = write_name(storage, frame, cursor, Some(name))?;
        }
        RRData::SOA {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => {
            cursor = write_name(storage, frame, cursor, Some(mname))?;
            cursor = write_name(storage, frame, cursor, Some(rname))?;
            for &field in &[serial, refresh, retry, expire, minimum] {
                frame.write_u32(cursor, field)?;
                cursor += 4;
            }
        }
        RRData::MX {
            preference,
            exchange,
        } => {
            frame.write_u16(cursor, preference)?;
            cursor = write_name(storage, frame, cursor + 2, Some(exchange))?;
        }
        // the payload of these isn't kept, so only an empty one can be written
        RRData::OPT | RRData::Unknown => {
            if record.rdlength != 0 {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Dns,
                    value: record.rtype,
                });
            }
        }
    }

    frame.write_u16(size_offset, (cursor - data_offset) as u16)?;
    Ok(cursor)
}

/// Length `encode_message` produces for `message`
pub(crate) fn message_len(message: &DnsMessage, storage: &HeaderStorage) -> usize {
    let questions: usize = storage
        .questions(message.questions)
        .map(|q| name_wire_len(storage, q.qname) + 4)
        .sum();
    let records: usize = [message.answers, message.nameservers, message.additional]
        .iter()
        .flat_map(|&head| storage.records(head))
        .map(|r| rr_len(storage, r))
        .sum();
    DNS_HEADER_LEN + questions + records
}

fn rr_len(storage: &HeaderStorage, record: &DnsResourceRecord) -> usize {
    let data = match record.data {
        RRData::A(..) => 4,
        RRData::MX { exchange, .. } => 2 + name_wire_len(storage, Some(exchange)),
        RRData::SOA { mname, rname, .. } => {
            name_wire_len(storage, Some(mname)) + name_wire_len(storage, Some(rname)) + 20
        }
        RRData::NS(name) | RRData::CNAME(name) | RRData::PTR(name) => {
            name_wire_len(storage, Some(name))
        }
        RRData::OPT | RRData::Unknown => 0,
    };
    name_wire_len(storage, record.name) + 10 + data
}
