//! UDP headers and the IPv4 pseudo-header used for their checksum

use std::net::Ipv4Addr;

use crate::arena::{HeaderArena, Slot};
use crate::checksum::{internet_checksum, Checksum};
use crate::dns_parser::DnsMessage;
use crate::header::{release_header, ChecksumStatus, Header, HeaderKind, HeaderRef};
use crate::storage::{HeaderStorage, Record};
use crate::{Error, RawFrame};

pub const UDP_HEADER_LEN: usize = 8;
/// Size of the IPv4 pseudo-header
pub const PSEUDO_HEADER_LEN: usize = 12;

pub const PORT_DNS: u16 = 53;

const OFFSET_SRC_PORT: usize = 0;
const OFFSET_DEST_PORT: usize = 2;
const OFFSET_LENGTH: usize = 4;
const OFFSET_CHECKSUM: usize = 6;

/// Source, destination and protocol of the enclosing IPv4 header.
///
/// Only ever part of a checksum computation, never transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    pub src: Ipv4Addr,
    pub dest: Ipv4Addr,
    pub protocol: u8,
}

impl PseudoHeader {
    fn to_bytes(&self, udp_length: u16) -> [u8; PSEUDO_HEADER_LEN] {
        let mut bytes = [0u8; PSEUDO_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.src.octets());
        bytes[4..8].copy_from_slice(&self.dest.octets());
        bytes[9] = self.protocol;
        bytes[10..12].copy_from_slice(&udp_length.to_be_bytes());
        bytes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dest_port: u16,
    /// Header plus payload; recomputed by encode
    pub length: u16,
    pub checksum: u16,
    pub checksum_status: ChecksumStatus,
    pub next: Option<HeaderRef>,
}

fn verify(
    frame: &RawFrame,
    offset: usize,
    header: &UdpHeader,
    pseudo: Option<PseudoHeader>,
) -> Result<ChecksumStatus, Error> {
    if header.checksum == 0 {
        return Ok(ChecksumStatus::Disabled);
    }
    let length = usize::from(header.length);
    let pseudo = match pseudo {
        Some(pseudo) if length >= UDP_HEADER_LEN && frame.remaining(offset) >= length => pseudo,
        _ => return Ok(ChecksumStatus::Unverified),
    };

    let mut computed = Checksum::new()
        .add(&pseudo.to_bytes(header.length))
        .add(frame.slice(offset, OFFSET_CHECKSUM)?)
        .add(frame.slice(offset + UDP_HEADER_LEN, length - UDP_HEADER_LEN)?)
        .finish();
    if computed == 0 {
        computed = 0xffff;
    }

    Ok(if computed == header.checksum {
        ChecksumStatus::Valid
    } else {
        ChecksumStatus::Mismatch { computed }
    })
}

impl Record for UdpHeader {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<UdpHeader> {
        &storage.udp
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<UdpHeader> {
        &mut storage.udp
    }

    fn release(storage: &mut HeaderStorage, slot: Slot<UdpHeader>) {
        release_header(storage, slot)
    }
}

impl Header for UdpHeader {
    const KIND: HeaderKind = HeaderKind::Udp;

    fn decode(
        storage: &mut HeaderStorage,
        frame: &RawFrame,
        offset: usize,
        pseudo: Option<PseudoHeader>,
    ) -> Result<Slot<UdpHeader>, Error> {
        storage.build(|storage, slot: Slot<UdpHeader>| {
            frame.require(offset, UDP_HEADER_LEN)?;

            let mut udp = UdpHeader {
                src_port: frame.read_u16(offset + OFFSET_SRC_PORT)?,
                dest_port: frame.read_u16(offset + OFFSET_DEST_PORT)?,
                length: frame.read_u16(offset + OFFSET_LENGTH)?,
                checksum: frame.read_u16(offset + OFFSET_CHECKSUM)?,
                checksum_status: ChecksumStatus::Unverified,
                next: None,
            };
            udp.checksum_status = verify(frame, offset, &udp, pseudo)?;

            udp.next = match udp.dest_port {
                PORT_DNS => Some(DnsMessage::wrap(DnsMessage::decode(
                    storage,
                    frame,
                    offset + UDP_HEADER_LEN,
                    None,
                )?)),
                other => {
                    return Err(Error::UnsupportedType {
                        layer: HeaderKind::Udp,
                        value: other,
                    })
                }
            };

            *storage.udp.get_mut(slot) = udp;
            Ok(())
        })
    }

    fn encode(
        &self,
        storage: &HeaderStorage,
        frame: &mut RawFrame,
        offset: usize,
        pseudo: Option<PseudoHeader>,
    ) -> Result<usize, Error> {
        let pseudo = pseudo.ok_or(Error::MissingPseudoHeader)?;
        if offset < PSEUDO_HEADER_LEN {
            return Err(Error::TooShort {
                required: PSEUDO_HEADER_LEN,
                present: offset,
            });
        }

        let payload_len = match (self.dest_port, self.next) {
            (PORT_DNS, Some(next @ HeaderRef::Dns(_))) => {
                next.encode(storage, frame, offset + UDP_HEADER_LEN, None)?
            }
            (other, _) => {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Udp,
                    value: other,
                })
            }
        };
        let length = UDP_HEADER_LEN + payload_len;
        let wire_length = length as u16;

        frame.write_u16(offset + OFFSET_SRC_PORT, self.src_port)?;
        frame.write_u16(offset + OFFSET_DEST_PORT, self.dest_port)?;
        frame.write_u16(offset + OFFSET_LENGTH, wire_length)?;
        frame.write_u16(offset + OFFSET_CHECKSUM, 0)?;

        // scratch space owned by the IPv4 header, which is written afterwards
        let pseudo_offset = offset - PSEUDO_HEADER_LEN;
        frame.write_slice(pseudo_offset, &pseudo.to_bytes(wire_length))?;

        // the pad byte is summed but not counted in the returned length
        let mut summed = PSEUDO_HEADER_LEN + length;
        if length % 2 == 1 {
            frame.write_u8(offset + length, 0)?;
            summed += 1;
        }
        let mut checksum = internet_checksum(frame.written(pseudo_offset, summed)?);
        if checksum == 0 {
            checksum = 0xffff;
        }

        frame.fill_zero(pseudo_offset, PSEUDO_HEADER_LEN)?;
        frame.write_u16(offset + OFFSET_CHECKSUM, checksum)?;

        Ok(length)
    }

    fn wire_size(&self, _storage: &HeaderStorage) -> usize {
        UDP_HEADER_LEN
    }

    fn next(&self) -> Option<HeaderRef> {
        self.next
    }

    fn wrap(slot: Slot<UdpHeader>) -> HeaderRef {
        HeaderRef::Udp(slot)
    }

    fn from_ref(header: HeaderRef) -> Option<Slot<UdpHeader>> {
        match header {
            HeaderRef::Udp(slot) => Some(slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use super::{PseudoHeader, UdpHeader};
    use crate::header::{Header, HeaderKind};
    use crate::{Error, HeaderStorage, RawFrame};

    #[test]
    fn pseudo_header_layout() {
        let pseudo = PseudoHeader {
            src: Ipv4Addr::new(188, 95, 29, 177),
            dest: Ipv4Addr::new(195, 134, 157, 20),
            protocol: 17,
        };
        assert_eq!(
            &pseudo.to_bytes(0x24)[..],
            b"\xbc\x5f\x1d\xb1\xc3\x86\x9d\x14\x00\x11\x00\x24"
        );
    }

    #[test]
    fn unsupported_port() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(b"\xd5\x03\x00\x7b\x00\x08\x00\x00").unwrap();
        assert_eq!(
            UdpHeader::decode(&mut storage, &frame, 0, None),
            Err(Error::UnsupportedType {
                layer: HeaderKind::Udp,
                value: 123
            })
        );
        assert_eq!(storage.outstanding(), 0);
    }

    #[test]
    fn header_too_short() {
        let mut storage = HeaderStorage::new();
        let frame = RawFrame::from_slice(b"\xd5\x03\x00\x35\x00").unwrap();
        assert_eq!(
            UdpHeader::decode(&mut storage, &frame, 0, None),
            Err(Error::TooShort {
                required: 8,
                present: 5
            })
        );
    }

    #[test]
    fn encode_needs_pseudo_header() {
        let storage = HeaderStorage::new();
        let mut frame = RawFrame::new();
        let udp = UdpHeader::default();
        assert_eq!(
            udp.encode(&storage, &mut frame, 34, None),
            Err(Error::MissingPseudoHeader)
        );
    }
}
