use std::fmt;

pub use std::net::{Ipv4Addr, Ipv6Addr};

pub const MAC_ADDRESS_LEN: usize = 6;
pub const IPV4_ADDRESS_LEN: usize = 4;
pub const IPV6_ADDRESS_LEN: usize = 16;

/// 48-bit MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    pub const NULL: MacAddress = MacAddress([0x00; MAC_ADDRESS_LEN]);
    pub const BROADCAST: MacAddress = MacAddress([0xff; MAC_ADDRESS_LEN]);

    pub fn from_slice(slice: &[u8]) -> Option<MacAddress> {
        if slice.len() != MAC_ADDRESS_LEN {
            return None;
        }
        let mut bytes = [0u8; MAC_ADDRESS_LEN];
        bytes.copy_from_slice(slice);
        Some(MacAddress(bytes))
    }

    pub fn octets(&self) -> [u8; MAC_ADDRESS_LEN] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddress::BROADCAST
    }

    /// Group bit of the first octet
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl From<[u8; MAC_ADDRESS_LEN]> for MacAddress {
    fn from(bytes: [u8; MAC_ADDRESS_LEN]) -> MacAddress {
        MacAddress(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::MacAddress;

    #[test]
    fn display_and_flags() {
        let mac = MacAddress([0x00, 0x15, 0x17, 0x0e, 0x61, 0xa2]);
        assert_eq!(mac.to_string(), "00:15:17:0e:61:a2");
        assert!(!mac.is_multicast());
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::BROADCAST.is_multicast());
        assert_eq!(MacAddress::from_slice(&[1, 2, 3]), None);
    }
}
