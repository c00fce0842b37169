//! Provides methods to read a block of ECU memory

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    memory::MemoryLocation,
    uds::{Request, Response, Service},
};

/// Decoded ReadMemoryByAddress response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMemoryByAddressData {
    /// Memory block sent by the server
    pub memory_block: Vec<u8>,
}

/// Builds a ReadMemoryByAddress request: ALFID, address, size
pub fn make_request(location: &MemoryLocation) -> UdsResult<Request> {
    let mut data = vec![location.alfid().get_byte()];
    data.extend(location.address_bytes());
    data.extend(location.memorysize_bytes());
    Request::new(Service::ReadMemoryByAddress, None, data)
}

/// Decodes a ReadMemoryByAddress response. The whole payload is the memory block
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    response.service_data = Some(
        ReadMemoryByAddressData {
            memory_block: response.data.clone(),
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Reads a block of memory.
    ///
    /// The location's formats default to [crate::ClientConfig::server_address_format] and
    /// [crate::ClientConfig::server_memorysize_format]. The returned block must be as long as
    /// requested. Extra zero bytes are trimmed when [crate::ClientConfig::tolerate_zero_padding] is set
    pub fn read_memory_by_address(&mut self, location: MemoryLocation) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let cfg = client.config();
            let location = location
                .with_default_formats(cfg.server_address_format, cfg.server_memorysize_format)?;
            let tolerate = cfg.tolerate_zero_padding;
            let req = make_request(&location)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let mut block = response.data.clone();
            let expected = location.memorysize() as usize;
            if block.len() < expected {
                let msg = format!(
                    "Data block given by the server is too short. Client requested for {expected} bytes but only received {} bytes",
                    block.len()
                );
                return Err(UdsError::unexpected(response, msg));
            }
            if block.len() > expected {
                if tolerate && block[expected..].iter().all(|b| *b == 0) {
                    block.truncate(expected);
                    response.service_data =
                        Some(ReadMemoryByAddressData { memory_block: block }.into());
                } else {
                    let msg = format!(
                        "Data block given by the server is too long. Client requested for {expected} bytes but received {} bytes",
                        block.len()
                    );
                    return Err(UdsError::unexpected(response, msg));
                }
            }
            Ok(Some(response))
        })
    }
}
