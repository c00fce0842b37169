//! Provides methods to clear diagnostic trouble codes from the ECU

use crate::{
    StandardVersion, UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, require_version},
};

/// Group of DTCs matching every DTC
pub const ALL_DTC_GROUPS: u32 = 0xFFFFFF;

/// Builds a ClearDiagnosticInformation request.
///
/// ## Parameters
/// * group - DTC group to clear. Only the lower 3 bytes can be used (0x000000 - 0xFFFFFF)
/// * memory_selection - User defined DTC memory to clear. Requires standard version 2020
/// * version - Standard version in use
pub fn make_request(
    group: u32,
    memory_selection: Option<u8>,
    version: StandardVersion,
) -> UdsResult<Request> {
    if group > ALL_DTC_GROUPS {
        return Err(UdsError::InvalidParameter(format!(
            "group must be a valid 24 bit integer, got 0x{group:X}"
        )));
    }
    let mut data = group.to_be_bytes()[1..].to_vec();
    if let Some(m) = memory_selection {
        require_version(version, StandardVersion::V2020, "Memory selection")?;
        data.push(m);
    }
    Request::new(Service::ClearDiagnosticInformation, None, data)
}

impl<C: Connection> UdsClient<C> {
    /// Clears DTCs. Without a group every DTC is cleared
    pub fn clear_dtc(
        &mut self,
        group: Option<u32>,
        memory_selection: Option<u8>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let version = client.config().standard_version;
            let req = make_request(group.unwrap_or(ALL_DTC_GROUPS), memory_selection, version)?;
            client.send_request(&req)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(
            make_request(0x123456, None, StandardVersion::V2013)
                .unwrap()
                .get_payload(),
            vec![0x14, 0x12, 0x34, 0x56]
        );
        assert_eq!(
            make_request(ALL_DTC_GROUPS, Some(0x99), StandardVersion::V2020)
                .unwrap()
                .get_payload(),
            vec![0x14, 0xFF, 0xFF, 0xFF, 0x99]
        );
        assert!(matches!(
            make_request(ALL_DTC_GROUPS, Some(0x99), StandardVersion::V2013),
            Err(UdsError::NotImplemented(_))
        ));
        assert!(make_request(0x1000000, None, StandardVersion::V2020).is_err());
    }
}
