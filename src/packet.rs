//! Reference-counted ownership of a decoded header chain

use std::iter;

use crate::arena::{HeaderArena, Slot};
use crate::dns_parser::DnsMessage;
use crate::ethernet::EthernetHeader;
use crate::header::{ChecksumStatus, Header, HeaderKind, HeaderRef};
use crate::ipv4::Ipv4Header;
use crate::storage::{HeaderStorage, Record};
use crate::udp::UdpHeader;
use crate::{Error, RawFrame};

#[derive(Debug, Clone, Copy, Default)]
pub struct PacketRecord {
    refcount: u32,
    head: Option<HeaderRef>,
}

impl Record for PacketRecord {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<PacketRecord> {
        &storage.packets
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<PacketRecord> {
        &mut storage.packets
    }

    fn release(storage: &mut HeaderStorage, slot: Slot<PacketRecord>) {
        if let Some(head) = storage.packets.get(slot).head {
            head.release(storage);
        }
        storage.packets.release(slot);
    }
}

/// Handle to a decoded packet living in a `HeaderStorage`.
///
/// Each handle accounts for one reference. Give it back with
/// `HeaderStorage::release`; `retain` makes another one.
#[must_use = "a packet stays allocated until it is released"]
#[derive(Debug, PartialEq, Eq)]
pub struct Packet {
    slot: Slot<PacketRecord>,
}

impl HeaderStorage {
    /// Decodes a frame into a packet with a reference count of one.
    ///
    /// Either the whole chain from Ethernet to DNS decodes, or nothing stays
    /// allocated.
    pub fn decode(&mut self, frame: &RawFrame) -> Result<Packet, Error> {
        let slot = self.build(|storage, slot: Slot<PacketRecord>| {
            let head = EthernetHeader::decode(storage, frame, 0, None)?;
            *storage.packets.get_mut(slot) = PacketRecord {
                refcount: 1,
                head: Some(EthernetHeader::wrap(head)),
            };
            Ok(())
        })?;
        Ok(Packet { slot })
    }

    /// Writes the header chain of `packet` to the start of `frame` and sets
    /// the frame length. Lengths and checksums are recomputed.
    pub fn encode(&self, packet: &Packet, frame: &mut RawFrame) -> Result<usize, Error> {
        let len = match self.packets.get(packet.slot).head {
            Some(head) => head.encode(self, frame, 0, None)?,
            None => 0,
        };
        frame.set_len(len)?;
        Ok(len)
    }

    pub fn retain(&mut self, packet: &Packet) -> Packet {
        self.packets.get_mut(packet.slot).refcount += 1;
        Packet { slot: packet.slot }
    }

    /// Drops one reference; the last one frees the whole header chain
    pub fn release(&mut self, packet: Packet) {
        let record = self.packets.get_mut(packet.slot);
        record.refcount = record.refcount.saturating_sub(1);
        if record.refcount == 0 {
            PacketRecord::release(self, packet.slot);
        }
    }

    pub fn refcount(&self, packet: &Packet) -> u32 {
        self.packets.get(packet.slot).refcount
    }

    /// Headers of the packet, outermost first
    pub fn chain<'a>(&'a self, packet: &Packet) -> impl Iterator<Item = HeaderRef> + 'a {
        let head = self.packets.get(packet.slot).head;
        iter::successors(head, move |header| header.next(self))
    }

    pub fn header<H: Header>(&self, packet: &Packet) -> Option<&H> {
        let slot = self.chain(packet).find_map(H::from_ref)?;
        Some(H::arena(self).get(slot))
    }

    pub fn header_mut<H: Header>(&mut self, packet: &Packet) -> Option<&mut H> {
        let slot = self.chain(packet).find_map(H::from_ref)?;
        Some(H::arena_mut(self).get_mut(slot))
    }

    pub fn ethernet(&self, packet: &Packet) -> Option<&EthernetHeader> {
        self.header(packet)
    }

    pub fn ipv4(&self, packet: &Packet) -> Option<&Ipv4Header> {
        self.header(packet)
    }

    pub fn udp(&self, packet: &Packet) -> Option<&UdpHeader> {
        self.header(packet)
    }

    pub fn dns(&self, packet: &Packet) -> Option<&DnsMessage> {
        self.header(packet)
    }

    /// Fails with `ChecksumMismatch` for the first layer whose stored
    /// checksum didn't match the one computed while decoding.
    pub fn verify_checksums(&self, packet: &Packet) -> Result<(), Error> {
        let mismatch = |layer: HeaderKind, stored: u16, status: ChecksumStatus| match status {
            ChecksumStatus::Mismatch { computed } => Err(Error::ChecksumMismatch {
                layer,
                stored,
                computed,
            }),
            _ => Ok(()),
        };

        if let Some(ip) = self.ipv4(packet) {
            mismatch(HeaderKind::Ipv4, ip.checksum, ip.checksum_status)?;
        }
        if let Some(udp) = self.udp(packet) {
            mismatch(HeaderKind::Udp, udp.checksum, udp.checksum_status)?;
        }
        Ok(())
    }

    /// Bytes `encode` writes for the packet
    pub fn wire_len(&self, packet: &Packet) -> usize {
        self.chain(packet).map(|header| header.wire_size(self)).sum()
    }
}

/// Ethernet/IPv4/UDP/DNS query for the root name, type ANY, with an OPT record
#[cfg(test)]
pub(crate) const SAMPLE_FRAME: &[u8] = b"\
    \x00\x15\x17\x0e\x61\xa2\x00\x03\x6c\xb3\x54\x1b\x08\x00\
    \x45\x00\x00\x38\xfa\xd6\x00\x00\xf3\x11\x92\x32\xbc\x5f\x1d\xb1\xc3\x86\x9d\x14\
    \xd5\x03\x00\x35\x00\x24\x00\x00\
    \x46\x14\x01\x00\x00\x01\x00\x00\x00\x00\x00\x01\
    \x00\x00\xff\x00\x01\
    \x00\x00\x29\x23\x28\x00\x00\x00\x00\x00\x00";

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use super::SAMPLE_FRAME;
    use crate::checksum::validate_checksum;
    use crate::dns_parser::{RRData, RecordType};
    use crate::ethernet::ETHERTYPE_IPV4;
    use crate::header::{ChecksumStatus, HeaderKind};
    use crate::ipv4::{Ipv4Header, PROTOCOL_UDP};
    use crate::{Error, HeaderStorage, MacAddress, RawFrame, StorageConfig};

    #[test]
    fn decode_sample_frame() {
        assert_eq!(SAMPLE_FRAME.len(), 70);
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let packet = storage.decode(&frame).unwrap();

        let kinds: Vec<_> = storage.chain(&packet).map(|h| h.kind()).collect();
        assert_eq!(
            kinds,
            [
                HeaderKind::Ethernet,
                HeaderKind::Ipv4,
                HeaderKind::Udp,
                HeaderKind::Dns
            ]
        );

        let ether = storage.ethernet(&packet).unwrap();
        assert_eq!(ether.ethertype, ETHERTYPE_IPV4);
        assert_eq!(ether.dest.to_string(), "00:15:17:0e:61:a2");
        assert_eq!(ether.src, MacAddress([0x00, 0x03, 0x6c, 0xb3, 0x54, 0x1b]));
        assert!(ether.vlan.is_none());

        let ip = storage.ipv4(&packet).unwrap();
        assert_eq!(ip.protocol, PROTOCOL_UDP);
        assert_eq!(ip.total_length, 56);
        assert_eq!(ip.ttl, 0xf3);
        assert_eq!(ip.src, Ipv4Addr::new(188, 95, 29, 177));
        assert_eq!(ip.dest, Ipv4Addr::new(195, 134, 157, 20));
        assert_eq!(ip.checksum, 0x9232);
        assert_eq!(ip.checksum_status, ChecksumStatus::Valid);

        let udp = storage.udp(&packet).unwrap();
        assert_eq!(udp.src_port, 0xd503);
        assert_eq!(udp.dest_port, 53);
        assert_eq!(udp.length, 0x24);
        assert_eq!(udp.checksum_status, ChecksumStatus::Disabled);

        let dns = *storage.dns(&packet).unwrap();
        assert_eq!(dns.id, 0x4614);
        assert!(!dns.flags.response());
        assert!(dns.flags.recursion_desired());
        assert_eq!(
            (dns.qd_count, dns.an_count, dns.ns_count, dns.ar_count),
            (1, 0, 0, 1)
        );

        let questions: Vec<_> = storage.questions(dns.questions).collect();
        assert_eq!(questions.len(), 1);
        assert_eq!(storage.domain_name(questions[0].qname), ".");
        assert_eq!(questions[0].qtype, 0x00ff);
        assert_eq!(questions[0].qclass, 1);

        assert!(dns.answers.is_none());
        assert!(dns.nameservers.is_none());
        let additional: Vec<_> = storage.records(dns.additional).collect();
        assert_eq!(additional.len(), 1);
        assert_eq!(additional[0].record_type(), RecordType::OPT);
        assert_eq!(additional[0].class, 0x2328);
        assert_eq!(additional[0].rdlength, 0);
        assert_eq!(additional[0].data, RRData::OPT);

        assert_eq!(storage.wire_len(&packet), 70);
        storage.verify_checksums(&packet).unwrap();
        storage.release(packet);
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn reencode_sample_frame() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let packet = storage.decode(&frame).unwrap();

        let mut output = RawFrame::new();
        assert_eq!(storage.encode(&packet, &mut output).unwrap(), 70);
        let bytes = output.as_bytes();

        // the sample carries no UDP checksum, encode always computes one
        assert_eq!(&bytes[..40], &SAMPLE_FRAME[..40]);
        assert_eq!(&bytes[42..], &SAMPLE_FRAME[42..]);
        assert_ne!(&bytes[40..42], b"\x00\x00");

        let again = storage.decode(&output).unwrap();
        assert_eq!(storage.udp(&again).unwrap().checksum_status, ChecksumStatus::Valid);
        assert_eq!(storage.ipv4(&again).unwrap().checksum_status, ChecksumStatus::Valid);
        storage.release(again);
        storage.release(packet);
    }

    /// Response to an A query whose answer name points back at the question
    const COMPRESSED_RESPONSE: &[u8] = b"\
        \x00\x15\x17\x0e\x61\xa2\x00\x03\x6c\xb3\x54\x1b\x08\x00\
        \x45\x00\x00\x49\xfa\xd6\x00\x00\xf3\x11\x00\x00\xbc\x5f\x1d\xb1\xc3\x86\x9d\x14\
        \xd5\x03\x00\x35\x00\x35\x00\x00\
        \x12\x34\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
        \x07example\x03com\x00\x00\x01\x00\x01\
        \xc0\x0c\x00\x01\x00\x01\x00\x00\x0e\x10\x00\x04\x5d\xb8\xd8\x22";

    #[test]
    fn pointer_is_relative_to_message_start() {
        assert_eq!(COMPRESSED_RESPONSE.len(), 87);
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(COMPRESSED_RESPONSE).unwrap();
        let packet = storage.decode(&frame).unwrap();

        let dns = *storage.dns(&packet).unwrap();
        assert!(dns.flags.response());
        let answers: Vec<_> = storage.records(dns.answers).collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(storage.domain_name(answers[0].name), "example.com");
        assert_eq!(answers[0].ttl, 3600);
        assert_eq!(answers[0].data, RRData::A(Ipv4Addr::new(93, 184, 216, 34)));

        storage.release(packet);
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn reencode_recomputes_lengths() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(COMPRESSED_RESPONSE).unwrap();
        let packet = storage.decode(&frame).unwrap();

        // the answer name grows from a 2 byte pointer to 13 bytes
        assert_eq!(storage.wire_len(&packet), 98);
        let mut output = RawFrame::new();
        assert_eq!(storage.encode(&packet, &mut output).unwrap(), 98);
        let bytes = output.as_bytes();
        assert_eq!(bytes.len(), 98);
        assert_eq!(&bytes[16..18], b"\x00\x54");
        assert_eq!(&bytes[38..40], b"\x00\x40");
        assert_eq!(&bytes[71..84], b"\x07example\x03com\x00");
        assert!(validate_checksum(&bytes[14..34]));

        let again = storage.decode(&output).unwrap();
        let ip = storage.ipv4(&again).unwrap();
        assert_eq!(ip.total_length, 84);
        assert_eq!(ip.checksum_status, ChecksumStatus::Valid);
        let udp = storage.udp(&again).unwrap();
        assert_eq!(udp.length, 64);
        assert_eq!(udp.checksum_status, ChecksumStatus::Valid);
        let dns = *storage.dns(&again).unwrap();
        let answers: Vec<_> = storage.records(dns.answers).collect();
        assert_eq!(storage.domain_name(answers[0].name), "example.com");

        storage.release(again);
        storage.release(packet);
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn ipv4_checksum_is_recomputed() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let packet = storage.decode(&frame).unwrap();

        let mut output = RawFrame::new();
        storage.encode(&packet, &mut output).unwrap();
        assert_eq!(&output.as_bytes()[24..26], b"\x92\x32");

        storage.header_mut::<Ipv4Header>(&packet).unwrap().ttl = 64;
        storage.encode(&packet, &mut output).unwrap();
        let header = &output.as_bytes()[14..34];
        assert_eq!(header[8], 64);
        assert_ne!(&header[10..12], b"\x92\x32");
        assert!(validate_checksum(header));
        storage.release(packet);
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let mut storage = HeaderStorage::new();
        let mut bytes = SAMPLE_FRAME.to_vec();
        bytes[22] = 0xf4;
        let frame = RawFrame::from_slice(&bytes).unwrap();
        let packet = storage.decode(&frame).unwrap();

        assert_eq!(
            storage.ipv4(&packet).unwrap().checksum_status,
            ChecksumStatus::Mismatch { computed: 0x9132 }
        );
        assert_eq!(
            storage.verify_checksums(&packet),
            Err(Error::ChecksumMismatch {
                layer: HeaderKind::Ipv4,
                stored: 0x9232,
                computed: 0x9132
            })
        );
        storage.release(packet);
    }

    #[test]
    fn failed_decode_leaves_nothing_allocated() {
        let mut storage = HeaderStorage::with_config(StorageConfig::with_seed(1));
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let packet = storage.decode(&frame).unwrap();
        storage.release(packet);
        let before = storage.stats();

        // cut in the middle of the question
        let truncated = RawFrame::from_slice(&SAMPLE_FRAME[..57]).unwrap();
        assert_eq!(
            storage.decode(&truncated),
            Err(Error::TooShort {
                required: 59,
                present: 57
            })
        );
        assert_eq!(storage.stats(), before);
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn unsupported_port_leaves_nothing_allocated() {
        let mut storage = HeaderStorage::new();
        let mut bytes = SAMPLE_FRAME.to_vec();
        bytes[37] = 54;
        let frame = RawFrame::from_slice(&bytes).unwrap();
        assert_eq!(
            storage.decode(&frame),
            Err(Error::UnsupportedType {
                layer: HeaderKind::Udp,
                value: 54
            })
        );
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn vlan_tagged_frame() {
        let mut bytes = SAMPLE_FRAME[..12].to_vec();
        bytes.extend_from_slice(b"\x81\x00\x20\x0a");
        bytes.extend_from_slice(&SAMPLE_FRAME[12..]);

        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(&bytes).unwrap();
        let packet = storage.decode(&frame).unwrap();

        let vlan = storage.ethernet(&packet).unwrap().vlan.unwrap();
        assert_eq!(vlan.vid(), 10);
        assert_eq!(vlan.pcp(), 1);
        assert_eq!(vlan.ethertype, ETHERTYPE_IPV4);
        assert_eq!(storage.dns(&packet).unwrap().id, 0x4614);

        let mut output = RawFrame::new();
        assert_eq!(storage.encode(&packet, &mut output).unwrap(), 74);
        assert_eq!(&output.as_bytes()[..44], &bytes[..44]);
        assert_eq!(&output.as_bytes()[46..], &bytes[46..]);
        storage.release(packet);
    }

    #[test]
    fn release_after_last_reference() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let packet = storage.decode(&frame).unwrap();
        let outstanding = storage.outstanding();

        let other = storage.retain(&packet);
        assert_eq!(other, packet);
        assert_eq!(storage.refcount(&packet), 2);

        storage.release(other);
        assert_eq!(storage.refcount(&packet), 1);
        assert_eq!(storage.outstanding(), outstanding);

        storage.release(packet);
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn released_slots_are_reused_by_the_next_decode() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(SAMPLE_FRAME).unwrap();
        let first = storage.decode(&frame).unwrap();
        let dns = storage.dns(&first).unwrap() as *const _;
        storage.release(first);

        let second = storage.decode(&frame).unwrap();
        assert_eq!(storage.dns(&second).unwrap() as *const _, dns);
        storage.release(second);
    }
}
