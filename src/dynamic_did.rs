//! Definition of a dynamically defined data identifier, used by
//! [crate::uds::dynamically_define_data_identifier]

use crate::{
    UdsError, UdsResult,
    memory::{AddressAndLengthFormatIdentifier, MemoryLocation},
};

/// One element of a dynamically defined data identifier
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DynamicDidEntry {
    /// Part of another data identifier
    ByDid {
        /// Source data identifier
        source_did: u16,
        /// Position of the first byte in the source DID, starting at 1
        position: u8,
        /// Number of bytes to take
        memorysize: u8,
    },
    /// A block of memory
    ByMemory(MemoryLocation),
}

/// Ordered list of entries making a dynamically defined data identifier.
///
/// All entries are either [DynamicDidEntry::ByDid] or [DynamicDidEntry::ByMemory]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicDidDefinition {
    entries: Vec<DynamicDidEntry>,
}

impl DynamicDidDefinition {
    /// Creates an empty definition
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slice of a source DID
    pub fn add_by_did(&mut self, source_did: u16, position: u8, memorysize: u8) -> UdsResult<()> {
        if position == 0 {
            return Err(UdsError::InvalidParameter(
                "position must be an integer between 1 and 0xFF".into(),
            ));
        }
        if memorysize == 0 {
            return Err(UdsError::InvalidParameter(
                "memorysize must be an integer between 1 and 0xFF".into(),
            ));
        }
        if self.is_by_memory_address() {
            return Err(UdsError::InvalidParameter(
                "Cannot mix entries defined by data identifier with entries defined by memory address".into(),
            ));
        }
        self.entries.push(DynamicDidEntry::ByDid {
            source_did,
            position,
            memorysize,
        });
        Ok(())
    }

    /// Adds a memory block
    pub fn add_by_memory(&mut self, location: MemoryLocation) -> UdsResult<()> {
        if self.is_by_source_did() {
            return Err(UdsError::InvalidParameter(
                "Cannot mix entries defined by memory address with entries defined by data identifier".into(),
            ));
        }
        self.entries.push(DynamicDidEntry::ByMemory(location));
        Ok(())
    }

    /// Builder variant of [DynamicDidDefinition::add_by_did]
    pub fn with_did(mut self, source_did: u16, position: u8, memorysize: u8) -> UdsResult<Self> {
        self.add_by_did(source_did, position, memorysize)?;
        Ok(self)
    }

    /// Builder variant of [DynamicDidDefinition::add_by_memory]
    pub fn with_memory(mut self, location: MemoryLocation) -> UdsResult<Self> {
        self.add_by_memory(location)?;
        Ok(self)
    }

    /// Entries of the definition
    pub fn entries(&self) -> &[DynamicDidEntry] {
        &self.entries
    }

    /// Returns true if no entry was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if entries are defined by source DID
    pub fn is_by_source_did(&self) -> bool {
        matches!(self.entries.first(), Some(DynamicDidEntry::ByDid { .. }))
    }

    /// Returns true if entries are defined by memory address
    pub fn is_by_memory_address(&self) -> bool {
        matches!(self.entries.first(), Some(DynamicDidEntry::ByMemory(_)))
    }

    /// Memory locations, with the server default formats applied
    pub(crate) fn memory_locations(
        &self,
        address_format: Option<u8>,
        memorysize_format: Option<u8>,
    ) -> UdsResult<Vec<MemoryLocation>> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                DynamicDidEntry::ByMemory(m) => Some(*m),
                DynamicDidEntry::ByDid { .. } => None,
            })
            .map(|m| m.with_default_formats(address_format, memorysize_format))
            .collect()
    }

    /// ALFID shared by every memory entry
    pub(crate) fn shared_alfid(
        locations: &[MemoryLocation],
    ) -> UdsResult<Option<AddressAndLengthFormatIdentifier>> {
        let Some(first) = locations.first() else {
            return Ok(None);
        };
        let alfid = first.alfid();
        if locations.iter().any(|m| m.alfid() != alfid) {
            return Err(UdsError::InvalidParameter(
                "All memory locations must use the same address and memory size formats".into(),
            ));
        }
        Ok(Some(alfid))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_mixing() {
        let mut d = DynamicDidDefinition::new();
        d.add_by_did(0x1234, 1, 2).unwrap();
        assert!(d.is_by_source_did());
        assert!(d.add_by_memory(MemoryLocation::auto(0x1000, 4)).is_err());

        let mut d = DynamicDidDefinition::new();
        d.add_by_memory(MemoryLocation::auto(0x1000, 4)).unwrap();
        assert!(d.is_by_memory_address());
        assert!(d.add_by_did(0x1234, 1, 2).is_err());
    }

    #[test]
    fn bad_values() {
        let mut d = DynamicDidDefinition::new();
        assert!(d.add_by_did(0x1234, 0, 2).is_err());
        assert!(d.add_by_did(0x1234, 1, 0).is_err());
        assert!(d.is_empty());
    }

    #[test]
    fn alfid_consistency() {
        let d = DynamicDidDefinition::new()
            .with_memory(MemoryLocation::auto(0x1000, 4))
            .unwrap()
            .with_memory(MemoryLocation::auto(0x10, 4))
            .unwrap();
        let locs = d.memory_locations(None, None).unwrap();
        assert!(DynamicDidDefinition::shared_alfid(&locs).is_err());

        let locs = d.memory_locations(Some(32), Some(8)).unwrap();
        assert_eq!(
            DynamicDidDefinition::shared_alfid(&locs).unwrap().unwrap().get_byte(),
            0x14
        );
    }
}
