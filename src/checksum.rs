//! Internet checksum (RFC 1071) used by the IPv4 and UDP layers.

use byteorder::{BigEndian, ByteOrder};

/// Incremental ones'-complement sum over 16-bit big-endian words.
///
/// Only the last chunk handed to `add` may have an odd length; its trailing
/// byte is padded with zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub fn new() -> Checksum {
        Checksum { sum: 0 }
    }

    pub fn add(&mut self, data: &[u8]) -> &mut Checksum {
        let mut chunks = data.chunks_exact(2);
        for word in &mut chunks {
            self.add_u16(BigEndian::read_u16(word));
        }
        if let Some(&byte) = chunks.remainder().first() {
            self.add_u16(u16::from(byte) << 8);
        }
        self
    }

    pub fn add_u16(&mut self, word: u16) -> &mut Checksum {
        self.sum += u32::from(word);
        // fold early so the accumulator never overflows on 4096-byte frames
        if self.sum > 0xffff {
            self.sum = (self.sum & 0xffff) + (self.sum >> 16);
        }
        self
    }

    pub fn finish(&self) -> u16 {
        let mut sum = self.sum;
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }
}

pub fn internet_checksum(data: &[u8]) -> u16 {
    Checksum::new().add(data).finish()
}

/// A region that carries its own checksum sums to zero.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xffff
}
