//! Module for common Diagnostic trouble code data

use bitflags::bitflags;

use crate::did::DidValue;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// DTC name interpretation format specifier
pub enum DtcFormat {
    /// ISO15031-6 DTC Format
    ISO15031_6,
    /// ISO14229-1 DTC Format
    ISO14229_1,
    /// SAEJ1939-73 DTC Format
    SAEJ1939_73,
    /// ISO11992-4 DTC Format
    ISO11992_4,
    /// SAEJ2012-DA WWH-OBD DTC Format
    SAEJ2012_DA_WWHOBD,
    /// Unknown DTC Format
    Unknown(u8),
}

impl From<u8> for DtcFormat {
    fn from(fmt: u8) -> Self {
        match fmt {
            0x00 => Self::ISO15031_6,
            0x01 => Self::ISO14229_1,
            0x02 => Self::SAEJ1939_73,
            0x03 => Self::ISO11992_4,
            0x04 => Self::SAEJ2012_DA_WWHOBD,
            x => Self::Unknown(x),
        }
    }
}

impl From<DtcFormat> for u8 {
    fn from(fmt: DtcFormat) -> Self {
        match fmt {
            DtcFormat::ISO15031_6 => 0x00,
            DtcFormat::ISO14229_1 => 0x01,
            DtcFormat::SAEJ1939_73 => 0x02,
            DtcFormat::ISO11992_4 => 0x03,
            DtcFormat::SAEJ2012_DA_WWHOBD => 0x04,
            DtcFormat::Unknown(x) => x,
        }
    }
}

bitflags! {
    /// DTC status byte
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct DtcStatus: u8 {
        /// Result of the most recent test is a failure
        const TEST_FAILED = 0x01;
        /// Test failed at least once in the current operation cycle
        const TEST_FAILED_THIS_OPERATION_CYCLE = 0x02;
        /// Test failed in the current or last completed operation cycle
        const PENDING_DTC = 0x04;
        /// Failure detected enough times for the DTC to be stored in long term memory
        const CONFIRMED_DTC = 0x08;
        /// Test has not run to completion since DTC information was last cleared
        const TEST_NOT_COMPLETED_SINCE_LAST_CLEAR = 0x10;
        /// Test failed at least once since DTC information was last cleared
        const TEST_FAILED_SINCE_LAST_CLEAR = 0x20;
        /// Test has not run to completion in the current operation cycle
        const TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE = 0x40;
        /// Server requests the warning indicator to be active
        const WARNING_INDICATOR_REQUESTED = 0x80;
    }
}

bitflags! {
    /// DTC severity byte
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct DtcSeverity: u8 {
        /// Unclassified
        const DTC_CLASS_0 = 0x01;
        /// Malfunction potentially affecting the emission related systems (WWH-OBD class A)
        const DTC_CLASS_1 = 0x02;
        /// WWH-OBD class B1
        const DTC_CLASS_2 = 0x04;
        /// WWH-OBD class B2
        const DTC_CLASS_3 = 0x08;
        /// WWH-OBD class C
        const DTC_CLASS_4 = 0x10;
        /// Failure requests maintenance only
        const MAINTENANCE_ONLY = 0x20;
        /// Failure must be checked at the next halt
        const CHECK_AT_NEXT_HALT = 0x40;
        /// Failure must be checked immediately
        const CHECK_IMMEDIATELY = 0x80;
    }
}

impl DtcStatus {
    /// Decodes a status byte. Every bit is kept
    pub fn from_byte(b: u8) -> Self {
        Self::from_bits_retain(b)
    }

    /// Encodes the status byte
    pub fn get_byte(&self) -> u8 {
        self.bits()
    }
}

impl DtcSeverity {
    /// Decodes a severity byte. Every bit is kept
    pub fn from_byte(b: u8) -> Self {
        Self::from_bits_retain(b)
    }

    /// Encodes the severity byte
    pub fn get_byte(&self) -> u8 {
        self.bits()
    }
}

/// Snapshot (Freeze frame) record of a DTC
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Snapshot record number
    pub record_number: u8,
    /// Data identifier of this snapshot, if the record holds DIDs
    pub did: Option<u16>,
    /// Value decoded with the DID codec
    pub data: Option<DidValue>,
    /// Raw bytes of the value
    pub raw_data: Vec<u8>,
}

/// Extended data record of a DTC
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedData {
    /// Extended data record number
    pub record_number: u8,
    /// Raw bytes of the record
    pub raw_data: Vec<u8>,
}

/// Diagnostic trouble code (DTC)
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dtc {
    /// 24 bit DTC number
    pub id: u32,
    /// Status of the DTC
    pub status: DtcStatus,
    /// Severity of the DTC
    pub severity: DtcSeverity,
    /// Functional unit, only reported with the severity
    pub functional_unit: Option<u8>,
    /// Fault detection counter, only reported by ReportDTCFaultDetectionCounter
    pub fault_counter: Option<u8>,
    /// Snapshot records
    pub snapshots: Vec<Snapshot>,
    /// Extended data records
    pub extended_data: Vec<ExtendedData>,
}

impl Dtc {
    /// Creates a DTC with an empty status
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Creates a DTC from its 3 byte representation
    pub fn from_bytes(b: &[u8; 3]) -> Self {
        Self::new(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
    }

    /// DTC id as 3 bytes
    pub fn id_bytes(&self) -> [u8; 3] {
        [(self.id >> 16) as u8, (self.id >> 8) as u8, self.id as u8]
    }

    /// Returns the DTC in the ISO15031-6 (OBD-II) form, such as `P0123-45`.
    /// The last byte is the failure type
    pub fn obd_code(&self) -> String {
        let prefix = match (self.id >> 22) & 0b11 {
            0b00 => 'P',
            0b01 => 'C',
            0b10 => 'B',
            _ => 'U',
        };
        format!(
            "{prefix}{:01X}{:03X}-{:02X}",
            (self.id >> 20) & 0b11,
            (self.id >> 8) & 0xFFF,
            self.id & 0xFF
        )
    }
}

impl std::fmt::Display for Dtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DTC 0x{:06X}, status=0x{:02X}", self.id, self.status.bits())?;
        if !self.severity.is_empty() {
            write!(f, ", severity=0x{:02X}", self.severity.bits())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_byte_round_trip() {
        for b in 0..=0xFFu8 {
            assert_eq!(DtcStatus::from_byte(b).get_byte(), b);
            assert_eq!(DtcSeverity::from_byte(b).get_byte(), b);
        }
        let s = DtcStatus::from_byte(0x09);
        assert!(s.contains(DtcStatus::TEST_FAILED | DtcStatus::CONFIRMED_DTC));
        assert!(!s.contains(DtcStatus::PENDING_DTC));
    }

    #[test]
    fn obd_code() {
        assert_eq!(Dtc::new(0x012345).obd_code(), "P0123-45");
        assert_eq!(Dtc::new(0xC10000).obd_code(), "U0100-00");
        assert_eq!(Dtc::new(0x5A0B01).obd_code(), "C1A0B-01");
    }

    #[test]
    fn bytes() {
        let d = Dtc::from_bytes(&[0x12, 0x34, 0x56]);
        assert_eq!(d.id, 0x123456);
        assert_eq!(d.id_bytes(), [0x12, 0x34, 0x56]);
        assert_eq!(DtcFormat::from(0x04), DtcFormat::SAEJ2012_DA_WWHOBD);
        assert_eq!(u8::from(DtcFormat::Unknown(0x10)), 0x10);
    }
}
