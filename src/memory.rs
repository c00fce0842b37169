//! Memory addressing primitives used by the memory and transfer services
//! (ReadMemoryByAddress, WriteMemoryByAddress, RequestDownload, RequestUpload, DynamicallyDefineDataIdentifier)

use crate::{UdsError, UdsResult, min_byte_width, read_be_uint, write_be_uint};

/// Address and memory size formats (In bits) a server can accept
pub const VALID_FORMATS: [u8; 8] = [8, 16, 24, 32, 40, 48, 56, 64];

pub(crate) fn check_format(format: u8, what: &str) -> UdsResult<()> {
    if VALID_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(UdsError::InvalidParameter(format!(
            "{what} must be one of {VALID_FORMATS:?}, got {format}"
        )))
    }
}

fn auto_format(value: u64) -> u8 {
    (min_byte_width(value) * 8) as u8
}

/// AddressAndLengthFormatIdentifier (ALFID).
///
/// Encodes the number of bytes used for a memory address (low nibble)
/// and a memory size (high nibble)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressAndLengthFormatIdentifier {
    address_format: u8,
    memorysize_format: u8,
}

impl AddressAndLengthFormatIdentifier {
    /// Creates a new ALFID from formats in bits
    pub fn new(address_format: u8, memorysize_format: u8) -> UdsResult<Self> {
        check_format(address_format, "address_format")?;
        check_format(memorysize_format, "memorysize_format")?;
        Ok(Self {
            address_format,
            memorysize_format,
        })
    }

    /// Decodes an ALFID byte
    pub fn from_byte(b: u8) -> UdsResult<Self> {
        let address_bytes = b & 0x0F;
        let memorysize_bytes = b >> 4;
        if !(1..=8).contains(&address_bytes) || !(1..=8).contains(&memorysize_bytes) {
            return Err(UdsError::InvalidParameter(format!(
                "AddressAndLengthFormatIdentifier 0x{b:02X} is not valid"
            )));
        }
        Self::new(address_bytes * 8, memorysize_bytes * 8)
    }

    /// Address format in bits
    pub fn address_format(&self) -> u8 {
        self.address_format
    }

    /// Memory size format in bits
    pub fn memorysize_format(&self) -> u8 {
        self.memorysize_format
    }

    /// Number of bytes used to encode an address
    pub fn address_bytes(&self) -> usize {
        self.address_format as usize / 8
    }

    /// Number of bytes used to encode a memory size
    pub fn memorysize_bytes(&self) -> usize {
        self.memorysize_format as usize / 8
    }

    /// Encodes the ALFID byte
    pub fn get_byte(&self) -> u8 {
        ((self.memorysize_bytes() as u8) << 4) | self.address_bytes() as u8
    }
}

/// A block of ECU memory
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryLocation {
    address: u64,
    memorysize: u64,
    address_format: Option<u8>,
    memorysize_format: Option<u8>,
}

impl MemoryLocation {
    /// Creates a memory location.
    ///
    /// ## Parameters
    /// * address - Start address
    /// * memorysize - Size of the block in bytes
    /// * address_format - Number of bits used to encode the address. If None, the smallest format that fits
    ///   the address is used, unless a server default is applied with [MemoryLocation::with_default_formats]
    /// * memorysize_format - Same as address_format, for the memory size
    pub fn new(
        address: u64,
        memorysize: u64,
        address_format: Option<u8>,
        memorysize_format: Option<u8>,
    ) -> UdsResult<Self> {
        let res = Self {
            address,
            memorysize,
            address_format,
            memorysize_format,
        };
        res.check()?;
        Ok(res)
    }

    /// Creates a memory location with automatic formats
    pub fn auto(address: u64, memorysize: u64) -> Self {
        Self {
            address,
            memorysize,
            address_format: None,
            memorysize_format: None,
        }
    }

    fn check(&self) -> UdsResult<()> {
        if let Some(fmt) = self.address_format {
            check_format(fmt, "address_format")?;
            if auto_format(self.address) > fmt {
                return Err(UdsError::InvalidParameter(format!(
                    "address 0x{:X} does not fit in {fmt} bits",
                    self.address
                )));
            }
        }
        if let Some(fmt) = self.memorysize_format {
            check_format(fmt, "memorysize_format")?;
            if auto_format(self.memorysize) > fmt {
                return Err(UdsError::InvalidParameter(format!(
                    "memorysize 0x{:X} does not fit in {fmt} bits",
                    self.memorysize
                )));
            }
        }
        Ok(())
    }

    /// Applies the server's default formats where this location does not specify its own
    pub fn with_default_formats(
        mut self,
        address_format: Option<u8>,
        memorysize_format: Option<u8>,
    ) -> UdsResult<Self> {
        if self.address_format.is_none() {
            self.address_format = address_format;
        }
        if self.memorysize_format.is_none() {
            self.memorysize_format = memorysize_format;
        }
        self.check()?;
        Ok(self)
    }

    /// Decodes a location from the raw address and size fields of a message.
    /// Formats are taken from the field widths
    pub fn from_bytes(address: &[u8], memorysize: &[u8]) -> UdsResult<Self> {
        let addr = read_be_uint(address, address.len())?;
        let size = read_be_uint(memorysize, memorysize.len())?;
        Self::new(
            addr,
            size,
            Some((address.len() * 8) as u8),
            Some((memorysize.len() * 8) as u8),
        )
    }

    /// Start address
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Size of the memory block
    pub fn memorysize(&self) -> u64 {
        self.memorysize
    }

    /// Effective address format in bits
    pub fn address_format(&self) -> u8 {
        self.address_format.unwrap_or_else(|| auto_format(self.address))
    }

    /// Effective memory size format in bits
    pub fn memorysize_format(&self) -> u8 {
        self.memorysize_format
            .unwrap_or_else(|| auto_format(self.memorysize))
    }

    /// ALFID describing this location
    pub fn alfid(&self) -> AddressAndLengthFormatIdentifier {
        AddressAndLengthFormatIdentifier {
            address_format: self.address_format(),
            memorysize_format: self.memorysize_format(),
        }
    }

    /// Encoded address
    pub fn address_bytes(&self) -> Vec<u8> {
        write_be_uint(self.address, self.address_format() as usize / 8)
    }

    /// Encoded memory size
    pub fn memorysize_bytes(&self) -> Vec<u8> {
        write_be_uint(self.memorysize, self.memorysize_format() as usize / 8)
    }
}

impl std::fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Address=0x{:X} ({} bits), Size=0x{:X} ({} bits)",
            self.address,
            self.address_format(),
            self.memorysize,
            self.memorysize_format()
        )
    }
}

/// DataFormatIdentifier, describing compression and encryption of transferred data
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataFormatIdentifier {
    compression: u8,
    encryption: u8,
}

impl DataFormatIdentifier {
    /// Creates a new DFI. Both methods are vendor specific values from 0 to 0xF. 0 means none
    pub fn new(compression: u8, encryption: u8) -> UdsResult<Self> {
        if compression > 0xF {
            return Err(UdsError::InvalidParameter(
                "compression must be an integer between 0 and 0xF".into(),
            ));
        }
        if encryption > 0xF {
            return Err(UdsError::InvalidParameter(
                "encryption must be an integer between 0 and 0xF".into(),
            ));
        }
        Ok(Self {
            compression,
            encryption,
        })
    }

    /// Decodes a DFI byte
    pub fn from_byte(b: u8) -> Self {
        Self {
            compression: b >> 4,
            encryption: b & 0x0F,
        }
    }

    /// Compression method
    pub fn compression(&self) -> u8 {
        self.compression
    }

    /// Encryption method
    pub fn encryption(&self) -> u8 {
        self.encryption
    }

    /// Encodes the DFI byte
    pub fn get_byte(&self) -> u8 {
        (self.compression << 4) | self.encryption
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auto_sizing() {
        let m = MemoryLocation::auto(0x1234, 0x10);
        assert_eq!(m.address_format(), 16);
        assert_eq!(m.memorysize_format(), 8);
        assert_eq!(m.alfid().get_byte(), 0x12);
        assert_eq!(m.address_bytes(), vec![0x12, 0x34]);
        assert_eq!(m.memorysize_bytes(), vec![0x10]);

        let m = MemoryLocation::auto(0, 0);
        assert_eq!(m.alfid().get_byte(), 0x11);

        let m = MemoryLocation::auto(u64::MAX, 0x100);
        assert_eq!(m.alfid().get_byte(), 0x28);
    }

    #[test]
    fn explicit_format() {
        let m = MemoryLocation::new(0x1234, 0x10, Some(32), Some(16)).unwrap();
        assert_eq!(m.address_bytes(), vec![0x00, 0x00, 0x12, 0x34]);
        assert_eq!(m.memorysize_bytes(), vec![0x00, 0x10]);
        assert_eq!(m.alfid().get_byte(), 0x24);

        assert!(MemoryLocation::new(0x123456, 0x10, Some(16), None).is_err());
        assert!(MemoryLocation::new(0x12, 0x10, Some(12), None).is_err());
        assert!(MemoryLocation::new(0x12, 0x1000, None, Some(8)).is_err());
    }

    #[test]
    fn server_defaults() {
        let m = MemoryLocation::auto(0x1234, 0x10)
            .with_default_formats(Some(32), Some(32))
            .unwrap();
        assert_eq!(m.alfid().get_byte(), 0x44);

        let m = MemoryLocation::new(0x1234, 0x10, Some(24), None)
            .unwrap()
            .with_default_formats(Some(32), Some(16))
            .unwrap();
        assert_eq!(m.alfid().get_byte(), 0x23);

        assert!(
            MemoryLocation::auto(0x123456, 1)
                .with_default_formats(Some(16), None)
                .is_err()
        );
    }

    #[test]
    fn alfid_byte() {
        let a = AddressAndLengthFormatIdentifier::from_byte(0x24).unwrap();
        assert_eq!(a.address_format(), 32);
        assert_eq!(a.memorysize_format(), 16);
        assert!(AddressAndLengthFormatIdentifier::from_byte(0x09).is_err());
        assert!(AddressAndLengthFormatIdentifier::from_byte(0x01).is_err());
    }

    #[test]
    fn from_bytes() {
        let m = MemoryLocation::from_bytes(&[0x00, 0x12, 0x34], &[0x01, 0x00]).unwrap();
        assert_eq!(m.address(), 0x1234);
        assert_eq!(m.memorysize(), 0x100);
        assert_eq!(m.address_format(), 24);
        assert_eq!(m.memorysize_format(), 16);
    }

    #[test]
    fn dfi() {
        let d = DataFormatIdentifier::new(1, 2).unwrap();
        assert_eq!(d.get_byte(), 0x12);
        assert_eq!(DataFormatIdentifier::from_byte(0x34), DataFormatIdentifier::new(3, 4).unwrap());
        assert!(DataFormatIdentifier::new(0x10, 0).is_err());
    }
}
