//! Ethernet II frames, optionally carrying one 802.1Q VLAN tag

use log::trace;

use crate::arena::{HeaderArena, Slot};
use crate::header::{release_header, Header, HeaderKind, HeaderRef};
use crate::ipv4::Ipv4Header;
use crate::storage::{HeaderStorage, Record};
use crate::udp::PseudoHeader;
use crate::{Error, MacAddress, RawFrame, MAC_ADDRESS_LEN};

/// Length on the wire, untagged
pub const ETHERNET_HEADER_LEN: usize = 14;
/// Length on the wire with a VLAN tag
pub const VLAN_HEADER_LEN: usize = 18;

const OFFSET_DEST: usize = 0;
const OFFSET_SRC: usize = 6;
const OFFSET_TYPE: usize = 12;
const OFFSET_VLAN_TCI: usize = 14;
const OFFSET_VLAN_TYPE: usize = 16;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VlanTag {
    /// Tag Control Information
    pub tci: u16,
    /// Ethertype of the payload
    pub ethertype: u16,
}

impl VlanTag {
    /// Priority Code Point
    pub fn pcp(&self) -> u8 {
        (self.tci >> 13) as u8
    }

    /// Drop Eligible Indicator
    pub fn dei(&self) -> bool {
        self.tci & 0x1000 != 0
    }

    /// VLAN Identifier
    pub fn vid(&self) -> u16 {
        self.tci & 0x0fff
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EthernetHeader {
    pub dest: MacAddress,
    pub src: MacAddress,
    /// Ethertype, or the VLAN TPID for tagged frames
    pub ethertype: u16,
    pub vlan: Option<VlanTag>,
    pub next: Option<HeaderRef>,
}

impl EthernetHeader {
    /// Ethertype used to pick the payload decoder
    pub fn payload_type(&self) -> u16 {
        match self.vlan {
            Some(ref vlan) => vlan.ethertype,
            None => self.ethertype,
        }
    }
}

fn read_mac(frame: &RawFrame, offset: usize) -> Result<MacAddress, Error> {
    let mut mac = [0u8; MAC_ADDRESS_LEN];
    mac.copy_from_slice(frame.slice(offset, MAC_ADDRESS_LEN)?);
    Ok(MacAddress(mac))
}

impl Record for EthernetHeader {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<EthernetHeader> {
        &storage.ethernet
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<EthernetHeader> {
        &mut storage.ethernet
    }

    fn release(storage: &mut HeaderStorage, slot: Slot<EthernetHeader>) {
        release_header(storage, slot)
    }
}

impl Header for EthernetHeader {
    const KIND: HeaderKind = HeaderKind::Ethernet;

    fn decode(
        storage: &mut HeaderStorage,
        frame: &RawFrame,
        offset: usize,
        _pseudo: Option<PseudoHeader>,
    ) -> Result<Slot<EthernetHeader>, Error> {
        storage.build(|storage, slot: Slot<EthernetHeader>| {
            frame.require(offset, ETHERNET_HEADER_LEN)?;

            let mut ether = EthernetHeader {
                dest: read_mac(frame, offset + OFFSET_DEST)?,
                src: read_mac(frame, offset + OFFSET_SRC)?,
                ethertype: frame.read_u16(offset + OFFSET_TYPE)?,
                vlan: None,
                next: None,
            };

            if ether.ethertype == ETHERTYPE_VLAN {
                frame.require(offset, VLAN_HEADER_LEN)?;
                let vlan = VlanTag {
                    tci: frame.read_u16(offset + OFFSET_VLAN_TCI)?,
                    ethertype: frame.read_u16(offset + OFFSET_VLAN_TYPE)?,
                };
                trace!(
                    "VLAN: tci=0x{:04x} vid={} pcp={} dei={}",
                    vlan.tci,
                    vlan.vid(),
                    vlan.pcp(),
                    vlan.dei()
                );
                ether.vlan = Some(vlan);
            }
            let payload = offset + ether.wire_size(storage);

            ether.next = match ether.payload_type() {
                ETHERTYPE_IPV4 => Some(Ipv4Header::wrap(Ipv4Header::decode(
                    storage, frame, payload, None,
                )?)),
                other => {
                    return Err(Error::UnsupportedType {
                        layer: HeaderKind::Ethernet,
                        value: other,
                    })
                }
            };

            *storage.ethernet.get_mut(slot) = ether;
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
        let header_len = self.wire_size(storage);

        let payload_len = match (self.payload_type(), self.next) {
            (ETHERTYPE_IPV4, Some(next @ HeaderRef::Ipv4(_))) => {
                next.encode(storage, frame, offset + header_len, None)?
            }
            (other, _) => {
                return Err(Error::UnsupportedType {
                    layer: HeaderKind::Ethernet,
                    value: other,
                })
            }
        };

        frame.write_slice(offset + OFFSET_DEST, &self.dest.octets())?;
        frame.write_slice(offset + OFFSET_SRC, &self.src.octets())?;
        frame.write_u16(offset + OFFSET_TYPE, self.ethertype)?;
        if let Some(ref vlan) = self.vlan {
            frame.write_u16(offset + OFFSET_VLAN_TCI, vlan.tci)?;
            frame.write_u16(offset + OFFSET_VLAN_TYPE, vlan.ethertype)?;
        }

        Ok(header_len + payload_len)
    }

    fn wire_size(&self, _storage: &HeaderStorage) -> usize {
        if self.vlan.is_some() {
            VLAN_HEADER_LEN
        } else {
            ETHERNET_HEADER_LEN
        }
    }

    fn next(&self) -> Option<HeaderRef> {
        self.next
    }

    fn wrap(slot: Slot<EthernetHeader>) -> HeaderRef {
        HeaderRef::Ethernet(slot)
    }

    fn from_ref(header: HeaderRef) -> Option<Slot<EthernetHeader>> {
        match header {
            HeaderRef::Ethernet(slot) => Some(slot),
            _ => None,
        }
    }
}
