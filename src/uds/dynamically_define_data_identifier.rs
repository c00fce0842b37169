//! Provides methods to define data identifiers at runtime, from parts of other
//! data identifiers or from memory blocks

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    dynamic_did::{DynamicDidDefinition, DynamicDidEntry},
    uds::{Request, Response, Service, check_echo, require_len},
};

/// DynamicallyDefineDataIdentifier subfunctions
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DynamicDidSubfunction {
    /// Defines a DID from parts of source DIDs
    DefineByIdentifier = 0x01,
    /// Defines a DID from memory blocks
    DefineByMemoryAddress = 0x02,
    /// Clears one or every dynamically defined DID
    ClearDynamicallyDefinedDataIdentifier = 0x03,
}

impl From<DynamicDidSubfunction> for u8 {
    fn from(s: DynamicDidSubfunction) -> Self {
        s as u8
    }
}

/// Decoded DynamicallyDefineDataIdentifier response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DynamicallyDefineDidData {
    /// Subfunction echoed by the server
    pub subfunction_echo: u8,
    /// DID echoed by the server. Absent when every DID was cleared
    pub did_echo: Option<u16>,
}

/// Builds a define request (subfunction 1 or 2 depending on the definition entries).
///
/// Memory locations without a format use the given server defaults, and must all end up
/// sharing one ALFID
pub fn make_define_request(
    did: u16,
    definition: &DynamicDidDefinition,
    address_format: Option<u8>,
    memorysize_format: Option<u8>,
) -> UdsResult<Request> {
    if definition.is_empty() {
        return Err(UdsError::InvalidParameter(
            "Dynamic DID definition must contain at least one entry".into(),
        ));
    }
    let mut data = did.to_be_bytes().to_vec();
    if definition.is_by_source_did() {
        for e in definition.entries() {
            if let DynamicDidEntry::ByDid {
                source_did,
                position,
                memorysize,
            } = e
            {
                data.extend_from_slice(&source_did.to_be_bytes());
                data.push(*position);
                data.push(*memorysize);
            }
        }
        Request::new(
            Service::DynamicallyDefineDataIdentifier,
            Some(DynamicDidSubfunction::DefineByIdentifier.into()),
            data,
        )
    } else {
        let locations = definition.memory_locations(address_format, memorysize_format)?;
        if let Some(alfid) = DynamicDidDefinition::shared_alfid(&locations)? {
            data.push(alfid.get_byte());
        }
        for m in &locations {
            data.extend(m.address_bytes());
            data.extend(m.memorysize_bytes());
        }
        Request::new(
            Service::DynamicallyDefineDataIdentifier,
            Some(DynamicDidSubfunction::DefineByMemoryAddress.into()),
            data,
        )
    }
}

/// Builds a clear request. Without a DID every dynamically defined DID is cleared
pub fn make_clear_request(did: Option<u16>) -> UdsResult<Request> {
    Request::new(
        Service::DynamicallyDefineDataIdentifier,
        Some(DynamicDidSubfunction::ClearDynamicallyDefinedDataIdentifier.into()),
        did.map(|d| d.to_be_bytes().to_vec()).unwrap_or_default(),
    )
}

/// Decodes a DynamicallyDefineDataIdentifier response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "subfunction echo")?;
    let subfunction_echo = response.data[0];
    let did_echo = match response.data.len() {
        1 if subfunction_echo
            == DynamicDidSubfunction::ClearDynamicallyDefinedDataIdentifier as u8 =>
        {
            None
        }
        1 | 2 => {
            return Err(UdsError::invalid(
                response,
                "Response must contain the echo of the data identifier",
            ));
        }
        _ => Some(u16::from_be_bytes([response.data[1], response.data[2]])),
    };
    response.service_data = Some(
        DynamicallyDefineDidData {
            subfunction_echo,
            did_echo,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    fn dynamic_did_exchange(&mut self, req: Request, did: Option<u16>) -> UdsResult<Option<Response>> {
        let subfunction = req.subfunction().unwrap_or_default();
        let Some(mut response) = self.send_request(&req)? else {
            return Ok(None);
        };
        interpret_response(&mut response)?;
        let data = response.service_data::<DynamicallyDefineDidData>().copied();
        let response = check_echo(
            response,
            "subfunction",
            data.map(|d| d.subfunction_echo),
            subfunction,
        )?;
        match did {
            Some(did) => check_echo(response, "data identifier", data.and_then(|d| d.did_echo), did)
                .map(Some),
            None => Ok(Some(response)),
        }
    }

    /// Defines a data identifier from the entries of `definition`
    pub fn dynamically_define_did(
        &mut self,
        did: u16,
        definition: &DynamicDidDefinition,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let cfg = client.config();
            let req = make_define_request(
                did,
                definition,
                cfg.server_address_format,
                cfg.server_memorysize_format,
            )?;
            client.dynamic_did_exchange(req, Some(did))
        })
    }

    /// Clears a dynamically defined data identifier, or all of them when `did` is None
    pub fn clear_dynamically_defined_did(&mut self, did: Option<u16>) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_clear_request(did)?;
            client.dynamic_did_exchange(req, did)
        })
    }
}
