/// The TYPE value of resource records this crate models
///
/// Everything else is kept as `Other` and its RDATA is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// a host address
    A,
    /// an authoritative name server
    NS,
    /// the canonical name for an alias
    CNAME,
    /// marks the start of a zone of authority
    SOA,
    /// a domain name pointer
    PTR,
    /// mail exchange
    MX,
    /// EDNS(0) pseudo-record, RFC 6891
    OPT,
    Other(u16),
}

impl RecordType {
    pub fn from_u16(value: u16) -> RecordType {
        use self::RecordType::*;
        match value {
            1 => A,
            2 => NS,
            5 => CNAME,
            6 => SOA,
            12 => PTR,
            15 => MX,
            41 => OPT,
            other => Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        use self::RecordType::*;
        match self {
            A => 1,
            NS => 2,
            CNAME => 5,
            SOA => 6,
            PTR => 12,
            MX => 15,
            OPT => 41,
            Other(value) => value,
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> RecordType {
        RecordType::from_u16(value)
    }
}

/// The OPCODE value according to RFC 1035
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    StandardQuery,
    InverseQuery,
    ServerStatusRequest,
    Notify,
    Update,
    Reserved(u8),
}

impl From<u8> for Opcode {
    fn from(code: u8) -> Opcode {
        use self::Opcode::*;
        match code {
            0 => StandardQuery,
            1 => InverseQuery,
            2 => ServerStatusRequest,
            4 => Notify,
            5 => Update,
            x => Reserved(x),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(code: Opcode) -> u8 {
        use self::Opcode::*;
        match code {
            StandardQuery => 0,
            InverseQuery => 1,
            ServerStatusRequest => 2,
            Notify => 4,
            Update => 5,
            Reserved(x) => x,
        }
    }
}

/// The RCODE value according to RFC 1035
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(u8),
}

impl From<u8> for ResponseCode {
    fn from(code: u8) -> ResponseCode {
        use self::ResponseCode::*;
        match code {
            0 => NoError,
            1 => FormatError,
            2 => ServerFailure,
            3 => NameError,
            4 => NotImplemented,
            5 => Refused,
            x => Reserved(x),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> u8 {
        use self::ResponseCode::*;
        match code {
            NoError => 0,
            FormatError => 1,
            ServerFailure => 2,
            NameError => 3,
            NotImplemented => 4,
            Refused => 5,
            Reserved(x) => x,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Opcode, RecordType, ResponseCode};

    #[test]
    fn record_type_values() {
        for &value in &[1u16, 2, 5, 6, 12, 15, 41, 28, 0xffff] {
            assert_eq!(RecordType::from_u16(value).to_u16(), value);
        }
        assert_eq!(RecordType::from(41), RecordType::OPT);
        assert_eq!(RecordType::from(28), RecordType::Other(28));
    }

    #[test]
    fn reserved_codes() {
        assert_eq!(Opcode::from(3), Opcode::Reserved(3));
        assert_eq!(u8::from(Opcode::Update), 5);
        assert_eq!(ResponseCode::from(9), ResponseCode::Reserved(9));
        assert_eq!(u8::from(ResponseCode::NameError), 3);
    }
}
