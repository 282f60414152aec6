use std::net::Ipv4Addr;

use log::trace;

use crate::arena::Slot;
use crate::storage::{HeaderStorage, Record};
use crate::{Error, RawFrame};

use super::name::scan_name;
use super::{
    DnsFlags, DnsLabel, DnsMessage, DnsQuery, DnsResourceRecord, RRData, RecordType,
    DNS_HEADER_LEN,
};

/// Smallest question: root name, qtype and qclass
const MIN_QUESTION_LEN: usize = 5;
/// Smallest resource record: root name, type, class, ttl and rdlength
const MIN_RECORD_LEN: usize = 11;

#[derive(Debug, Clone, Copy)]
enum Section {
    Answers,
    Nameservers,
    Additional,
}

impl Section {
    fn head(self, message: &mut DnsMessage) -> &mut Option<Slot<DnsResourceRecord>> {
        match self {
            Section::Answers => &mut message.answers,
            Section::Nameservers => &mut message.nameservers,
            Section::Additional => &mut message.additional,
        }
    }
}

struct Parser<'a> {
    frame: &'a RawFrame,
    /// Offset of the message in the frame; compression pointers are relative to it
    start: usize,
    cursor: usize,
}

/// Decodes the message at `offset`.
///
/// Every question and record is linked into the message as soon as it is
/// complete, so that releasing the message on failure releases all of them.
pub(crate) fn decode_message(
    storage: &mut HeaderStorage,
    frame: &RawFrame,
    offset: usize,
) -> Result<Slot<DnsMessage>, Error> {
    storage.build(|storage, slot: Slot<DnsMessage>| {
        frame.require(offset, DNS_HEADER_LEN)?;
        let message = DnsMessage {
            id: frame.read_u16(offset)?,
            flags: DnsFlags(frame.read_u16(offset + 2)?),
            qd_count: frame.read_u16(offset + 4)?,
            an_count: frame.read_u16(offset + 6)?,
            ns_count: frame.read_u16(offset + 8)?,
            ar_count: frame.read_u16(offset + 10)?,
            ..DnsMessage::default()
        };
        trace!(
            "DNS id=0x{:04x} qd={} an={} ns={} ar={}",
            message.id,
            message.qd_count,
            message.an_count,
            message.ns_count,
            message.ar_count
        );
        *storage.dns.get_mut(slot) = message;

        let mut parser = Parser {
            frame,
            start: offset,
            cursor: offset + DNS_HEADER_LEN,
        };
        parser.questions(storage, slot, message.qd_count)?;
        parser.records(storage, slot, Section::Answers, message.an_count)?;
        parser.records(storage, slot, Section::Nameservers, message.ns_count)?;
        parser.records(storage, slot, Section::Additional, message.ar_count)?;
        Ok(())
    })
}

impl<'a> Parser<'a> {
    fn name(&mut self, storage: &mut HeaderStorage) -> Result<Slot<DnsLabel>, Error> {
        let (name, end) = scan_name(storage, self.frame, self.start, self.cursor)?;
        self.cursor = end;
        Ok(name)
    }

    fn questions(
        &mut self,
        storage: &mut HeaderStorage,
        message: Slot<DnsMessage>,
        count: u16,
    ) -> Result<(), Error> {
        let mut tail: Option<Slot<DnsQuery>> = None;
        for _ in 0..count {
            let query = storage.build(|storage, query| self.question(storage, query))?;
            match tail {
                Some(prev) => storage.queries.get_mut(prev).next = Some(query),
                None => storage.dns.get_mut(message).questions = Some(query),
            }
            tail = Some(query);
        }
        Ok(())
    }

    fn question(&mut self, storage: &mut HeaderStorage, slot: Slot<DnsQuery>) -> Result<(), Error> {
        self.frame.require(self.cursor, MIN_QUESTION_LEN)?;
        let qname = self.name(storage)?;
        storage.queries.get_mut(slot).qname = Some(qname);

        let qtype = self.frame.read_u16(self.cursor)?;
        let qclass = self.frame.read_u16(self.cursor + 2)?;
        self.cursor += 4;

        let query = storage.queries.get_mut(slot);
        query.qtype = qtype;
        query.qclass = qclass;
        Ok(())
    }

    fn records(
        &mut self,
        storage: &mut HeaderStorage,
        message: Slot<DnsMessage>,
        section: Section,
        count: u16,
    ) -> Result<(), Error> {
        let mut tail: Option<Slot<DnsResourceRecord>> = None;
        for _ in 0..count {
            let record = storage.build(|storage, record| self.record(storage, record))?;
            match tail {
                Some(prev) => storage.records.get_mut(prev).next = Some(record),
                None => *section.head(storage.dns.get_mut(message)) = Some(record),
            }
            tail = Some(record);
        }
        Ok(())
    }

    fn record(
        &mut self,
        storage: &mut HeaderStorage,
        slot: Slot<DnsResourceRecord>,
    ) -> Result<(), Error> {
        self.frame.require(self.cursor, MIN_RECORD_LEN)?;
        let name = self.name(storage)?;
        storage.records.get_mut(slot).name = Some(name);

        let rtype = self.frame.read_u16(self.cursor)?;
        let class = self.frame.read_u16(self.cursor + 2)?;
        let ttl = self.frame.read_u32(self.cursor + 4)?;
        let rdlength = self.frame.read_u16(self.cursor + 8)?;
        self.cursor += 10;
        {
            let record = storage.records.get_mut(slot);
            record.rtype = rtype;
            record.class = class;
            record.ttl = ttl;
            record.rdlength = rdlength;
        }

        let rdata_start = self.cursor;
        let data = self.rdata(storage, slot, rtype, rdlength)?;
        storage.records.get_mut(slot).data = data;

        let consumed = self.cursor - rdata_start;
        if consumed != usize::from(rdlength) {
            return Err(Error::WrongRdataLength {
                rtype,
                declared: rdlength,
                consumed,
            });
        }
        Ok(())
    }

    /// Decodes the RDATA of a record whose fixed fields are already in `slot`.
    ///
    /// Names are stored into the record before anything else can fail, so
    /// that they are released with it.
    fn rdata(
        &mut self,
        storage: &mut HeaderStorage,
        slot: Slot<DnsResourceRecord>,
        rtype: u16,
        rdlength: u16,
    ) -> Result<RRData, Error> {
        Ok(match RecordType::from_u16(rtype) {
            RecordType::A => {
                if rdlength != 4 {
                    return Err(Error::WrongRdataLength {
                        rtype,
                        declared: rdlength,
                        consumed: 4,
                    });
                }
                let address = Ipv4Addr::from(self.frame.read_u32(self.cursor)?);
                self.cursor += 4;
                RRData::A(address)
            }
            RecordType::NS => RRData::NS(self.name(storage)?),
            RecordType::CNAME => RRData::CNAME(self.name(storage)?),
            RecordType::PTR => RRData::PTR(self.name(storage)?),
            RecordType::SOA => {
                let mname = self.name(storage)?;
                let rname = match self.name(storage) {
                    Ok(rname) => rname,
                    Err(err) => {
                        DnsLabel::release(storage, mname);
                        return Err(err);
                    }
                };
                storage.records.get_mut(slot).data = RRData::SOA {
                    mname,
                    rname,
                    serial: 0,
                    refresh: 0,
                    retry: 0,
                    expire: 0,
                    minimum: 0,
                };

                let mut fields = [0u32; 5];
                for (i, field) in fields.iter_mut().enumerate() {
                    *field = self.frame.read_u32(self.cursor + 4 * i)?;
                }
                self.cursor += 20;
                RRData::SOA {
                    mname,
                    rname,
                    serial: fields[0],
                    refresh: fields[1],
                    retry: fields[2],
                    expire: fields[3],
                    minimum: fields[4],
                }
            }
            RecordType::MX => {
                let preference = self.frame.read_u16(self.cursor)?;
                self.cursor += 2;
                RRData::MX {
                    preference,
                    exchange: self.name(storage)?,
                }
            }
            RecordType::OPT => {
                self.skip(rdlength)?;
                RRData::OPT
            }
            RecordType::Other(_) => {
                self.skip(rdlength)?;
                RRData::Unknown
            }
        })
    }

    fn skip(&mut self, len: u16) -> Result<(), Error> {
        self.frame.require(self.cursor, usize::from(len))?;
        self.cursor += usize::from(len);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use super::decode_message;
    use crate::arena::Slot;
    use crate::dns_parser::{DnsMessage, RRData, RecordType};
    use crate::{Error, HeaderStorage, RawFrame};

    fn decode(bytes: &[u8]) -> (HeaderStorage, Result<Slot<DnsMessage>, Error>) {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(bytes).unwrap();
        let result = decode_message(&mut storage, &frame, 0);
        (storage, result)
    }

    #[test]
    fn parse_example_query() {
        let query = b"\x06%\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                      \x07example\x03com\x00\x00\x01\x00\x01";
        let (storage, result) = decode(query);
        let message = *storage.dns.get(result.unwrap());
        assert_eq!(message.id, 1573);
        assert!(message.flags.recursion_desired());
        assert_eq!(message.qd_count, 1);

        let questions: Vec<_> = storage.questions(message.questions).collect();
        assert_eq!(questions.len(), 1);
        assert_eq!(storage.domain_name(questions[0].qname), "example.com");
        assert_eq!(questions[0].qtype, 1);
        assert_eq!(questions[0].qclass, 1);
    }

    #[test]
    fn parse_example_response() {
        let response = b"\x06%\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
                         \x07example\x03com\x00\x00\x01\x00\x01\
                         \xc0\x0c\x00\x01\x00\x01\x00\x00\x04\xf8\
                         \x00\x04]\xb8\xd8\"";
        let (storage, result) = decode(response);
        let message = *storage.dns.get(result.unwrap());
        assert!(message.flags.response());

        let answers: Vec<_> = storage.records(message.answers).collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(storage.domain_name(answers[0].name), "example.com");
        assert_eq!(answers[0].record_type(), RecordType::A);
        assert_eq!(answers[0].ttl, 1272);
        assert_eq!(answers[0].data, RRData::A(Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn parse_name_records() {
        let response = b"\x00\x01\x81\x80\x00\x00\x00\x03\x00\x00\x00\x00\
                         \x03foo\x00\x00\x05\x00\x01\x00\x00\x00\x3c\x00\x05\x03bar\x00\
                         \xc0\x0c\x00\x0f\x00\x01\x00\x00\x00\x3c\x00\x04\x00\x0a\xc0\x1b\
                         \xc0\x0c\x00\x0c\x00\x01\x00\x00\x00\x3c\x00\x02\xc0\x0c";
        let (storage, result) = decode(response);
        let message = *storage.dns.get(result.unwrap());

        let answers: Vec<_> = storage.records(message.answers).collect();
        assert_eq!(answers.len(), 3);
        match answers[0].data {
            RRData::CNAME(name) => assert_eq!(storage.domain_name(Some(name)), "bar"),
            ref other => panic!("unexpected {:?}", other),
        }
        match answers[1].data {
            RRData::MX {
                preference,
                exchange,
            } => {
                assert_eq!(preference, 10);
                assert_eq!(storage.domain_name(Some(exchange)), "bar");
            }
            ref other => panic!("unexpected {:?}", other),
        }
        match answers[2].data {
            RRData::PTR(name) => assert_eq!(storage.domain_name(Some(name)), "foo"),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parse_soa() {
        let response = b"\x00\x02\x81\x80\x00\x00\x00\x00\x00\x01\x00\x00\
                         \x03com\x00\x00\x06\x00\x01\x00\x00\x03\x84\x00\x1c\
                         \x01a\xc0\x0c\x01b\xc0\x0c\
                         \x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03\x00\x00\x00\x04\x00\x00\x00\x05";
        let (storage, result) = decode(response);
        let message = *storage.dns.get(result.unwrap());
        assert!(message.answers.is_none());

        let authority: Vec<_> = storage.records(message.nameservers).collect();
        assert_eq!(authority.len(), 1);
        match authority[0].data {
            RRData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                assert_eq!(storage.domain_name(Some(mname)), "a.com");
                assert_eq!(storage.domain_name(Some(rname)), "b.com");
                assert_eq!((serial, refresh, retry, expire, minimum), (1, 2, 3, 4, 5));
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_soa_releases_names() {
        let response = b"\x00\x02\x81\x80\x00\x00\x00\x00\x00\x01\x00\x00\
                         \x03com\x00\x00\x06\x00\x01\x00\x00\x03\x84\x00\x1c\
                         \x01a\xc0\x0c\x01b\xc0\x0c\
                         \x00\x00\x00\x01";
        let (storage, result) = decode(response);
        assert!(matches!(result, Err(Error::TooShort { .. })));
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn skips_unknown_rdata() {
        // AAAA answer followed by an OPT record
        let response = b"\x00\x03\x81\x80\x00\x00\x00\x01\x00\x00\x00\x01\
                         \x00\x00\x1c\x00\x01\x00\x00\x00\x3c\x00\x10\
                         \x20\x01\x0d\xb8\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\
                         \x00\x00\x29\x10\x00\x00\x00\x00\x00\x00\x00";
        let (storage, result) = decode(response);
        let message = *storage.dns.get(result.unwrap());
        let answer = storage.records(message.answers).next().unwrap();
        assert_eq!(answer.record_type(), RecordType::Other(28));
        assert_eq!(answer.rdlength, 16);
        assert_eq!(answer.data, RRData::Unknown);
        let opt = storage.records(message.additional).next().unwrap();
        assert_eq!(opt.data, RRData::OPT);
        assert_eq!(opt.class, 4096);
    }

    #[test]
    fn rdlength_must_match_consumed_bytes() {
        // CNAME declaring one byte more than its name takes
        let response = b"\x00\x04\x81\x80\x00\x00\x00\x01\x00\x00\x00\x00\
                         \x00\x00\x05\x00\x01\x00\x00\x00\x3c\x00\x06\x03bar\x00\x00";
        let (storage, result) = decode(response);
        assert_eq!(
            result.unwrap_err(),
            Error::WrongRdataLength {
                rtype: 5,
                declared: 6,
                consumed: 5
            }
        );
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn a_record_needs_four_bytes() {
        let response = b"\x00\x05\x81\x80\x00\x00\x00\x01\x00\x00\x00\x00\
                         \x00\x00\x01\x00\x01\x00\x00\x00\x3c\x00\x03\x01\x02\x03";
        let (_, result) = decode(response);
        assert!(matches!(
            result,
            Err(Error::WrongRdataLength {
                rtype: 1,
                declared: 3,
                ..
            })
        ));
    }

    #[test]
    fn truncated_question_releases_everything() {
        let query = b"\x06%\x01\x00\x00\x02\x00\x00\x00\x00\x00\x00\
                      \x07example\x03com\x00\x00\x01\x00\x01\
                      \x03www\xc0\x0c\x00";
        let (storage, result) = decode(query);
        assert!(matches!(result, Err(Error::TooShort { .. })));
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn counts_beyond_the_data() {
        let (storage, result) = decode(b"\x00\x06\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00");
        assert_eq!(
            result,
            Err(Error::TooShort {
                required: 17,
                present: 12
            })
        );
        assert_eq!(storage.outstanding(), 0);
    }
}
