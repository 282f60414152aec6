//! IPv4 headers without options

use std::net::Ipv4Addr;

use crate::arena::{HeaderArena, Slot};
use crate::checksum::{internet_checksum, Checksum};
use crate::header::{release_header, ChecksumStatus, Header, HeaderKind, HeaderRef};
use crate::storage::{HeaderStorage, Record};
use crate::udp::{PseudoHeader, UdpHeader};
use crate::{Error, RawFrame};

pub const IPV4_HEADER_LEN: usize = 20;

pub const PROTOCOL_ICMP: u8 = 1;
pub const PROTOCOL_TCP: u8 = 6;
pub const PROTOCOL_UDP: u8 = 17;

const OFFSET_VER_IHL: usize = 0;
const OFFSET_TOS: usize = 1;
const OFFSET_TOTAL_LENGTH: usize = 2;
const OFFSET_IDENTIFICATION: usize = 4;
const OFFSET_FLAGS: usize = 6;
const OFFSET_TTL: usize = 8;
const OFFSET_PROTOCOL: usize = 9;
const OFFSET_CHECKSUM: usize = 10;
const OFFSET_SRC: usize = 12;
const OFFSET_DEST: usize = 16;

const FLAG_RESERVED: u16 = 0x8000;
const FLAG_DONT_FRAGMENT: u16 = 0x4000;
const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    /// Version in the high nibble, IHL in the low one
    pub ver_ihl: u8,
    /// DSCP in the upper six bits, ECN in the lower two
    pub tos: u8,
    /// Header plus payload; recomputed by encode
    pub total_length: u16,
    pub identification: u16,
    /// Flags in the upper three bits, fragment offset in the rest
    pub flags_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    /// As found on the wire; encode always recomputes it
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dest: Ipv4Addr,
    pub checksum_status: ChecksumStatus,
    pub next: Option<HeaderRef>,
}

impl Default for Ipv4Header {
    fn default() -> Ipv4Header {
        Ipv4Header {
            ver_ihl: 0x45,
            tos: 0,
            total_length: 0,
            identification: 0,
            flags_offset: 0,
            ttl: 0,
            protocol: 0,
            checksum: 0,
            src: Ipv4Addr::UNSPECIFIED,
            dest: Ipv4Addr::UNSPECIFIED,
            checksum_status: ChecksumStatus::Unverified,
            next: None,
        }
    }
}

impl Ipv4Header {
    pub fn version(&self) -> u8 {
        self.ver_ihl >> 4
    }

    /// Header length in 32-bit words
    pub fn ihl(&self) -> u8 {
        self.ver_ihl & 0x0f
    }

    pub fn dscp(&self) -> u8 {
        self.tos >> 2
    }

    pub fn ecn(&self) -> u8 {
        self.tos & 0x03
    }

    pub fn reserved(&self) -> bool {
        self.flags_offset & FLAG_RESERVED != 0
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags_offset & FLAG_DONT_FRAGMENT != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_offset & FLAG_MORE_FRAGMENTS != 0
    }

    /// Offset of this fragment in units of 8 bytes
    pub fn fragment_offset(&self) -> u16 {
        self.flags_offset & FRAGMENT_OFFSET_MASK
    }

    pub fn pseudo_header(&self) -> PseudoHeader {
        PseudoHeader {
            src: self.src,
            dest: self.dest,
            protocol: self.protocol,
        }
    }
}

fn read_addr(frame: &RawFrame, offset: usize) -> Result<Ipv4Addr, Error> {
    Ok(Ipv4Addr::from(frame.read_u32(offset)?))
}

fn verify(frame: &RawFrame, offset: usize, stored: u16) -> Result<ChecksumStatus, Error> {
    let computed = Checksum::new()
        .add(frame.slice(offset, OFFSET_CHECKSUM)?)
        .add(frame.slice(offset + OFFSET_SRC, IPV4_HEADER_LEN - OFFSET_SRC)?)
        .finish();
    Ok(if computed == stored {
        ChecksumStatus::Valid
    } else {
        ChecksumStatus::Mismatch { computed }
    })
}

impl Record for Ipv4Header {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<Ipv4Header> {
        &storage.ipv4
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<Ipv4Header> {
        &mut storage.ipv4
    }

    fn release(storage: &mut HeaderStorage, slot: Slot<Ipv4Header>) {
        release_header(storage, slot)
    }
}

impl Header for Ipv4Header {
    const KIND: HeaderKind = HeaderKind::Ipv4;

    fn decode(
        storage: &mut HeaderStorage,
        frame: &RawFrame,
        offset: usize,
        _pseudo: Option<PseudoHeader>,
    ) -> Result<Slot<Ipv4Header>, Error> {
        storage.build(|storage, slot: Slot<Ipv4Header>| {
            let ver_ihl = frame.read_u8(offset + OFFSET_VER_IHL)?;
            if ver_ihl >> 4 != 4 {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Ipv4,
                    value: u16::from(ver_ihl >> 4),
                });
            }
            frame.require(offset, IPV4_HEADER_LEN)?;
            if ver_ihl & 0x0f != 5 {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Ipv4,
                    value: u16::from(ver_ihl),
                });
            }

            let checksum = frame.read_u16(offset + OFFSET_CHECKSUM)?;
            let mut ip = Ipv4Header {
                ver_ihl,
                tos: frame.read_u8(offset + OFFSET_TOS)?,
                total_length: frame.read_u16(offset + OFFSET_TOTAL_LENGTH)?,
                identification: frame.read_u16(offset + OFFSET_IDENTIFICATION)?,
                flags_offset: frame.read_u16(offset + OFFSET_FLAGS)?,
                ttl: frame.read_u8(offset + OFFSET_TTL)?,
                protocol: frame.read_u8(offset + OFFSET_PROTOCOL)?,
                checksum,
                src: read_addr(frame, offset + OFFSET_SRC)?,
                dest: read_addr(frame, offset + OFFSET_DEST)?,
                checksum_status: verify(frame, offset, checksum)?,
                next: None,
            };

            ip.next = match ip.protocol {
                PROTOCOL_UDP => Some(UdpHeader::wrap(UdpHeader::decode(
                    storage,
                    frame,
                    offset + IPV4_HEADER_LEN,
                    Some(ip.pseudo_header()),
                )?)),
                other => {
                    return Err(Error::UnsupportedType {
                        layer: HeaderKind::Ipv4,
                        value: u16::from(other),
                    })
                }
            };

            *storage.ipv4.get_mut(slot) = ip;
            Ok(())
        })
    }

    fn encode(
        &self,
        storage: &HeaderStorage,
        frame: &mut RawFrame,
        offset: usize,
        _pseudo: Option<PseudoHeader>,
    ) -> Result<usize, Error> {
        // the UDP layer borrows the 12 bytes in front of it for its
        // pseudo-header, so it has to run before this header is written
        let payload_len = match (self.protocol, self.next) {
            (PROTOCOL_UDP, Some(next @ HeaderRef::Udp(_))) => next.encode(
                storage,
                frame,
                offset + IPV4_HEADER_LEN,
                Some(self.pseudo_header()),
            )?,
            (other, _) => {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Ipv4,
                    value: u16::from(other),
                })
            }
        };

        let total_length = IPV4_HEADER_LEN + payload_len;

        frame.write_u8(offset + OFFSET_VER_IHL, self.ver_ihl)?;
        frame.write_u8(offset + OFFSET_TOS, self.tos)?;
        frame.write_u16(offset + OFFSET_TOTAL_LENGTH, total_length as u16)?;
        frame.write_u16(offset + OFFSET_IDENTIFICATION, self.identification)?;
        frame.write_u16(offset + OFFSET_FLAGS, self.flags_offset)?;
        frame.write_u8(offset + OFFSET_TTL, self.ttl)?;
        frame.write_u8(offset + OFFSET_PROTOCOL, self.protocol)?;
        frame.write_u16(offset + OFFSET_CHECKSUM, 0)?;
        frame.write_u32(offset + OFFSET_SRC, u32::from(self.src))?;
        frame.write_u32(offset + OFFSET_DEST, u32::from(self.dest))?;

        let checksum = internet_checksum(frame.written(offset, IPV4_HEADER_LEN)?);
        frame.write_u16(offset + OFFSET_CHECKSUM, checksum)?;

        Ok(total_length)
    }

    fn wire_size(&self, _storage: &HeaderStorage) -> usize {
        IPV4_HEADER_LEN
    }

    fn next(&self) -> Option<HeaderRef> {
        self.next
    }

    fn wrap(slot: Slot<Ipv4Header>) -> HeaderRef {
        HeaderRef::Ipv4(slot)
    }

    fn from_ref(header: HeaderRef) -> Option<Slot<Ipv4Header>> {
        match header {
            HeaderRef::Ipv4(slot) => Some(slot),
            _ => None,
        }
    }
}
