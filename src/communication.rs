//! Communication parameters used by CommunicationControl and LinkControl

use crate::{UdsError, UdsResult};

/// CommunicationType byte of the CommunicationControl service.
///
/// Bits 0-1 select the message types affected, bits 4-7 select the subnet
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommunicationType {
    subnet: u8,
    normal_msg: bool,
    network_management_msg: bool,
}

impl CommunicationType {
    /// Disable/Enable all subnets on which the server is connected
    pub const SUBNET_ALL: u8 = 0x0;
    /// Disable/Enable the subnet on which this request was received
    pub const SUBNET_RECEIVING: u8 = 0xF;

    /// Creates a communication type.
    ///
    /// ## Parameters
    /// * subnet - 0 for all networks, 1-14 for a specific subnet, 15 for the network this request is received on
    /// * normal_msg - Affect application messages
    /// * network_management_msg - Affect network management messages
    pub fn new(subnet: u8, normal_msg: bool, network_management_msg: bool) -> UdsResult<Self> {
        if subnet > 0xF {
            return Err(UdsError::InvalidParameter(
                "subnet must be an integer between 0 and 0xF".into(),
            ));
        }
        if !normal_msg && !network_management_msg {
            return Err(UdsError::InvalidParameter(
                "At least one kind of message must be selected (normal_msg or network_management_msg)".into(),
            ));
        }
        Ok(Self {
            subnet,
            normal_msg,
            network_management_msg,
        })
    }

    /// Decodes a communication type byte
    pub fn from_byte(b: u8) -> UdsResult<Self> {
        Self::new(b >> 4, b & 0x01 != 0, b & 0x02 != 0)
    }

    /// Subnet number
    pub fn subnet(&self) -> u8 {
        self.subnet
    }

    /// True if application messages are affected
    pub fn normal_msg(&self) -> bool {
        self.normal_msg
    }

    /// True if network management messages are affected
    pub fn network_management_msg(&self) -> bool {
        self.network_management_msg
    }

    /// Encodes the communication type byte
    pub fn get_byte(&self) -> u8 {
        let mut b = self.subnet << 4;
        if self.normal_msg {
            b |= 0x01;
        }
        if self.network_management_msg {
            b |= 0x02;
        }
        b
    }
}

/// How a [Baudrate] is encoded on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaudrateKind {
    /// One byte identifier from the standard table of fixed baudrates
    Fixed,
    /// Three byte baudrate in bits per second
    Specific,
    /// Raw one byte identifier. The baudrate value is the identifier itself
    Identifier,
    /// Fixed if the baudrate is in the table of fixed baudrates, otherwise Specific
    Auto,
}

/// Standard fixed baudrate identifiers
const FIXED_BAUDRATES: [(u8, u32); 9] = [
    (0x01, 9_600),
    (0x02, 19_200),
    (0x03, 38_400),
    (0x04, 57_600),
    (0x05, 115_200),
    (0x10, 125_000),
    (0x11, 250_000),
    (0x12, 500_000),
    (0x13, 1_000_000),
];

fn fixed_id(baudrate: u32) -> Option<u8> {
    FIXED_BAUDRATES
        .iter()
        .find(|(_, b)| *b == baudrate)
        .map(|(id, _)| *id)
}

fn fixed_baud(id: u8) -> Option<u32> {
    FIXED_BAUDRATES
        .iter()
        .find(|(i, _)| *i == id)
        .map(|(_, b)| *b)
}

/// Baudrate parameter of the LinkControl service
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Baudrate {
    baudrate: u32,
    kind: BaudrateKind,
}

impl Baudrate {
    /// Creates a new baudrate
    pub fn new(baudrate: u32, kind: BaudrateKind) -> UdsResult<Self> {
        match kind {
            BaudrateKind::Fixed if fixed_id(baudrate).is_none() => {
                return Err(UdsError::InvalidParameter(format!(
                    "Baudrate {baudrate} is not a standard fixed baudrate"
                )));
            }
            BaudrateKind::Specific | BaudrateKind::Auto if baudrate > 0xFFFFFF => {
                return Err(UdsError::InvalidParameter(
                    "Specific baudrate must fit in 3 bytes".into(),
                ));
            }
            BaudrateKind::Identifier if baudrate > 0xFF => {
                return Err(UdsError::InvalidParameter(
                    "Baudrate identifier must be between 0 and 0xFF".into(),
                ));
            }
            _ => {}
        }
        Ok(Self { baudrate, kind })
    }

    /// Baudrate value. In bits per second, except for [BaudrateKind::Identifier]
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// Requested encoding
    pub fn kind(&self) -> BaudrateKind {
        self.kind
    }

    /// Encoding that will be used, with [BaudrateKind::Auto] resolved
    pub fn effective_kind(&self) -> BaudrateKind {
        match self.kind {
            BaudrateKind::Auto if fixed_id(self.baudrate).is_some() => BaudrateKind::Fixed,
            BaudrateKind::Auto => BaudrateKind::Specific,
            k => k,
        }
    }

    /// Converts this baudrate to another encoding
    pub fn to_kind(&self, kind: BaudrateKind) -> UdsResult<Self> {
        let bps = match self.effective_kind() {
            BaudrateKind::Identifier => fixed_baud(self.baudrate as u8).ok_or_else(|| {
                UdsError::InvalidParameter(format!(
                    "Baudrate identifier 0x{:02X} is not a known fixed baudrate",
                    self.baudrate
                ))
            })?,
            _ => self.baudrate,
        };
        match kind {
            BaudrateKind::Identifier => {
                let id = fixed_id(bps).ok_or_else(|| {
                    UdsError::InvalidParameter(format!(
                        "Baudrate {bps} has no standard identifier"
                    ))
                })?;
                Self::new(id as u32, kind)
            }
            _ => Self::new(bps, kind),
        }
    }

    /// Encodes the baudrate
    pub fn get_bytes(&self) -> Vec<u8> {
        match self.effective_kind() {
            BaudrateKind::Fixed => vec![fixed_id(self.baudrate).unwrap_or_default()],
            BaudrateKind::Identifier => vec![self.baudrate as u8],
            _ => self.baudrate.to_be_bytes()[1..].to_vec(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn communication_type() {
        let c = CommunicationType::new(3, true, false).unwrap();
        assert_eq!(c.get_byte(), 0x31);
        let c = CommunicationType::new(CommunicationType::SUBNET_RECEIVING, true, true).unwrap();
        assert_eq!(c.get_byte(), 0xF3);
        assert_eq!(CommunicationType::from_byte(0xF3).unwrap(), c);
        assert!(CommunicationType::new(0, false, false).is_err());
        assert!(CommunicationType::new(0x10, true, false).is_err());
        assert!(CommunicationType::from_byte(0x10).is_err());
    }

    #[test]
    fn baudrate_encoding() {
        let b = Baudrate::new(500_000, BaudrateKind::Auto).unwrap();
        assert_eq!(b.effective_kind(), BaudrateKind::Fixed);
        assert_eq!(b.get_bytes(), vec![0x12]);

        let b = Baudrate::new(500_001, BaudrateKind::Auto).unwrap();
        assert_eq!(b.effective_kind(), BaudrateKind::Specific);
        assert_eq!(b.get_bytes(), vec![0x07, 0xA1, 0x21]);

        let b = Baudrate::new(0x12, BaudrateKind::Identifier).unwrap();
        assert_eq!(b.get_bytes(), vec![0x12]);

        assert!(Baudrate::new(123, BaudrateKind::Fixed).is_err());
        assert!(Baudrate::new(0x1000000, BaudrateKind::Specific).is_err());
        assert!(Baudrate::new(0x100, BaudrateKind::Identifier).is_err());
    }

    #[test]
    fn baudrate_conversion() {
        let b = Baudrate::new(0x13, BaudrateKind::Identifier).unwrap();
        let fixed = b.to_kind(BaudrateKind::Fixed).unwrap();
        assert_eq!(fixed.baudrate(), 1_000_000);
        assert_eq!(fixed.get_bytes(), vec![0x13]);
        let specific = b.to_kind(BaudrateKind::Specific).unwrap();
        assert_eq!(specific.get_bytes(), vec![0x0F, 0x42, 0x40]);

        let b = Baudrate::new(250_000, BaudrateKind::Specific).unwrap();
        assert_eq!(b.to_kind(BaudrateKind::Fixed).unwrap().get_bytes(), vec![0x11]);
        assert!(
            Baudrate::new(250_001, BaudrateKind::Specific)
                .unwrap()
                .to_kind(BaudrateKind::Fixed)
                .is_err()
        );
    }
}
