use byteorder::{BigEndian, ByteOrder};

use crate::Error;

/// Maximum number of bytes in a frame, without preamble and SFD but with FCS.
pub const MAX_FRAME_SIZE: usize = 4096;

/// One captured or to-be-sent link-layer frame
///
/// Reads are bounded by the logical length, writes by the capacity. Every
/// accessor checks `offset + size` first and fails with `Error::TooShort`
/// instead of touching memory outside the frame.
#[derive(Clone)]
pub struct RawFrame {
    data: [u8; MAX_FRAME_SIZE],
    len: u16,
}

impl RawFrame {
    pub fn new() -> RawFrame {
        RawFrame {
            data: [0; MAX_FRAME_SIZE],
            len: 0,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<RawFrame, Error> {
        let mut frame = RawFrame::new();
        frame.load(bytes)?;
        Ok(frame)
    }

    /// Replaces the content of the frame with `bytes`
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(Error::TooShort {
                required: bytes.len(),
                present: MAX_FRAME_SIZE,
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len() as u16;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        MAX_FRAME_SIZE
    }

    pub fn set_len(&mut self, len: usize) -> Result<(), Error> {
        if len > MAX_FRAME_SIZE {
            return Err(Error::TooShort {
                required: len,
                present: MAX_FRAME_SIZE,
            });
        }
        self.len = len as u16;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Bytes left between `offset` and the logical end of the frame
    pub fn remaining(&self, offset: usize) -> usize {
        self.len().saturating_sub(offset)
    }

    /// Fails unless `size` bytes starting at `offset` are readable
    pub fn require(&self, offset: usize, size: usize) -> Result<(), Error> {
        let required = offset.saturating_add(size);
        if required > self.len() {
            return Err(Error::TooShort {
                required,
                present: self.len(),
            });
        }
        Ok(())
    }

    pub fn slice(&self, offset: usize, size: usize) -> Result<&[u8], Error> {
        self.require(offset, size)?;
        Ok(&self.data[offset..offset + size])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, Error> {
        self.require(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.slice(offset, 2)?))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.slice(offset, 4)?))
    }

    fn slice_mut(&mut self, offset: usize, size: usize) -> Result<&mut [u8], Error> {
        let required = offset.saturating_add(size);
        if required > MAX_FRAME_SIZE {
            return Err(Error::TooShort {
                required,
                present: MAX_FRAME_SIZE,
            });
        }
        Ok(&mut self.data[offset..offset + size])
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        self.slice_mut(offset, 1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        BigEndian::write_u16(self.slice_mut(offset, 2)?, value);
        Ok(())
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        BigEndian::write_u32(self.slice_mut(offset, 4)?, value);
        Ok(())
    }

    pub fn write_slice(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        self.slice_mut(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill_zero(&mut self, offset: usize, size: usize) -> Result<(), Error> {
        for byte in self.slice_mut(offset, size)? {
            *byte = 0;
        }
        Ok(())
    }

    /// Bytes between `offset` and `offset + size`, ignoring the logical length.
    ///
    /// The encode path needs this for checksums over regions it has just
    /// written but not yet accounted for in `len`.
    pub(crate) fn written(&self, offset: usize, size: usize) -> Result<&[u8], Error> {
        let required = offset.saturating_add(size);
        if required > MAX_FRAME_SIZE {
            return Err(Error::TooShort {
                required,
                present: MAX_FRAME_SIZE,
            });
        }
        Ok(&self.data[offset..offset + size])
    }
}

impl Default for RawFrame {
    fn default() -> RawFrame {
        RawFrame::new()
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("RawFrame")
            .field("len", &self.len)
            .field("data", &self.as_bytes())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{RawFrame, MAX_FRAME_SIZE};
    use crate::Error;

    #[test]
    fn reads_are_bounded_by_length() {
        let frame = RawFrame::from_slice(b"\x12\x34\x56").unwrap();
        assert_eq!(frame.read_u16(0).unwrap(), 0x1234);
        assert_eq!(frame.read_u8(2).unwrap(), 0x56);
        assert_eq!(
            frame.read_u16(2),
            Err(Error::TooShort {
                required: 4,
                present: 3
            })
        );
        assert!(frame.slice(usize::max_value(), 2).is_err());
    }

    #[test]
    fn writes_are_bounded_by_capacity() {
        let mut frame = RawFrame::new();
        frame.write_u32(MAX_FRAME_SIZE - 4, 0xdead_beef).unwrap();
        assert!(frame.write_u16(MAX_FRAME_SIZE - 1, 1).is_err());
        frame.set_len(MAX_FRAME_SIZE).unwrap();
        assert_eq!(frame.read_u32(MAX_FRAME_SIZE - 4).unwrap(), 0xdead_beef);
    }

    #[test]
    fn oversized_input_is_rejected() {
        let bytes = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(RawFrame::from_slice(&bytes).is_err());
    }
}
