use std::fmt;

use log::trace;

use crate::arena::{HeaderArena, Slot};
use crate::storage::{HeaderStorage, Record};
use crate::{Error, RawFrame};

use super::structs::{Iter, Linked};

/// Longest literal label
pub const MAX_LABEL_LEN: usize = 63;
/// Longest domain name, counting labels and the dots between them
pub const MAX_NAME_LEN: usize = 253;

const LABEL_MASK: u8 = 0b1100_0000;
const LABEL_POINTER: u8 = 0b1100_0000;
const LABEL_LITERAL: u8 = 0b0000_0000;
const POINTER_MASK: u16 = 0b0011_1111_1111_1111;

/// One segment of a domain name.
///
/// A name is a chain of labels ending in a zero-length root label. Labels
/// reached through a compression pointer are copies, never shared with the
/// name the pointer refers to.
#[derive(Clone, Copy)]
pub struct DnsLabel {
    pub len: u8,
    pub value: [u8; MAX_LABEL_LEN],
    pub next: Option<Slot<DnsLabel>>,
}

impl DnsLabel {
    pub fn as_bytes(&self) -> &[u8] {
        &self.value[..usize::from(self.len)]
    }

    pub fn is_root(&self) -> bool {
        self.len == 0
    }
}

impl Default for DnsLabel {
    fn default() -> DnsLabel {
        DnsLabel {
            len: 0,
            value: [0; MAX_LABEL_LEN],
            next: None,
        }
    }
}

impl fmt::Debug for DnsLabel {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DnsLabel")
            .field("value", &String::from_utf8_lossy(self.as_bytes()))
            .field("next", &self.next)
            .finish()
    }
}

impl Linked for DnsLabel {
    fn next_link(&self) -> Option<Slot<DnsLabel>> {
        self.next
    }
}

impl Record for DnsLabel {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<DnsLabel> {
        &storage.labels
    }

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<DnsLabel> {
        &mut storage.labels
    }

    /// Releases the label and every label after it
    fn release(storage: &mut HeaderStorage, slot: Slot<DnsLabel>) {
        let mut next = Some(slot);
        while let Some(slot) = next {
            next = storage.labels.get(slot).next;
            storage.labels.release(slot);
        }
    }
}

/// Label chain under construction; released as a whole on failure
struct NameBuilder {
    head: Option<Slot<DnsLabel>>,
    tail: Option<Slot<DnsLabel>>,
}

impl NameBuilder {
    fn push(&mut self, storage: &mut HeaderStorage, value: &[u8]) -> Result<Slot<DnsLabel>, Error> {
        let slot = storage.labels.allocate()?;
        {
            let label = storage.labels.get_mut(slot);
            label.len = value.len() as u8;
            label.value[..value.len()].copy_from_slice(value);
        }
        match self.tail {
            Some(tail) => storage.labels.get_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        Ok(slot)
    }
}

/// Decodes the name at `cursor` into a fresh label chain.
///
/// Returns the head of the chain and the position right after the name as it
/// appears at `cursor`: past the root label, or past the first compression
/// pointer. A pointer has to refer strictly before the place where the labels
/// it continues started, which makes every chain of pointers finite.
pub(crate) fn scan_name(
    storage: &mut HeaderStorage,
    frame: &RawFrame,
    message: usize,
    cursor: usize,
) -> Result<(Slot<DnsLabel>, usize), Error> {
    let mut name = NameBuilder {
        head: None,
        tail: None,
    };
    match scan_labels(storage, frame, message, cursor, &mut name) {
        Ok(result) => Ok(result),
        Err(err) => {
            if let Some(head) = name.head {
                DnsLabel::release(storage, head);
            }
            Err(err)
        }
    }
}

fn scan_labels(
    storage: &mut HeaderStorage,
    frame: &RawFrame,
    message: usize,
    cursor: usize,
    name: &mut NameBuilder,
) -> Result<(Slot<DnsLabel>, usize), Error> {
    let mut pos = cursor;
    let mut chain_start = cursor;
    let mut end = None;
    let mut name_len = 0;

    loop {
        let octet = frame.read_u8(pos)?;
        match octet & LABEL_MASK {
            LABEL_POINTER => {
                let target = message + usize::from(frame.read_u16(pos)? & POINTER_MASK);
                if target >= chain_start {
                    return Err(Error::MalformedCompressionPointer {
                        pointer: pos,
                        target,
                    });
                }
                trace!("compression pointer at {} to {}", pos, target);
                end = end.or(Some(pos + 2));
                pos = target;
                chain_start = target;
            }
            LABEL_LITERAL if octet == 0 => {
                let root = name.push(storage, &[])?;
                let head = name.head.unwrap_or(root);
                return Ok((head, end.unwrap_or(pos + 1)));
            }
            LABEL_LITERAL => {
                let len = usize::from(octet);
                let value = frame.slice(pos + 1, len)?;
                name_len += if name_len == 0 { len } else { len + 1 };
                if name_len > MAX_NAME_LEN {
                    return Err(Error::NameTooLong(name_len));
                }
                name.push(storage, value)?;
                pos += 1 + len;
            }
            _ => return Err(Error::UnknownLabelFormat(octet)),
        }
    }
}

/// Writes a label chain uncompressed, terminated by the root label.
///
/// Returns the position after the name.
pub(crate) fn write_name(
    storage: &HeaderStorage,
    frame: &mut RawFrame,
    mut cursor: usize,
    name: Option<Slot<DnsLabel>>,
) -> Result<usize, Error> {
    for label in storage.labels(name).filter(|l| !l.is_root()) {
        frame.write_u8(cursor, label.len)?;
        frame.write_slice(cursor + 1, label.as_bytes())?;
        cursor += 1 + usize::from(label.len);
    }
    frame.write_u8(cursor, 0)?;
    Ok(cursor + 1)
}

/// Bytes `write_name` uses for a label chain
pub(crate) fn name_wire_len(storage: &HeaderStorage, name: Option<Slot<DnsLabel>>) -> usize {
    storage
        .labels(name)
        .filter(|l| !l.is_root())
        .map(|l| 1 + usize::from(l.len))
        .sum::<usize>()
        + 1
}

impl HeaderStorage {
    pub fn label(&self, slot: Slot<DnsLabel>) -> &DnsLabel {
        self.labels.get(slot)
    }

    pub fn labels(&self, name: Option<Slot<DnsLabel>>) -> Iter<'_, DnsLabel> {
        Iter::new(self, name)
    }

    /// Renders a label chain as dotted text, `"."` for the root name.
    ///
    /// Bytes that aren't UTF-8 are replaced rather than rejected.
    pub fn domain_name(&self, name: Option<Slot<DnsLabel>>) -> String {
        let mut text = String::new();
        for label in self.labels(name).filter(|l| !l.is_root()) {
            if !text.is_empty() {
                text.push('.');
            }
            text.push_str(&String::from_utf8_lossy(label.as_bytes()));
        }
        if text.is_empty() {
            text.push('.');
        }
        text
    }
}
