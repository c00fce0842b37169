//! Provides methods to write a block of ECU memory

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    memory::{AddressAndLengthFormatIdentifier, MemoryLocation},
    read_be_uint,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Decoded WriteMemoryByAddress response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WriteMemoryByAddressData {
    /// ALFID echoed by the server
    pub alfid_echo: u8,
    /// Memory location echoed by the server
    pub memory_location_echo: MemoryLocation,
}

/// Builds a WriteMemoryByAddress request: ALFID, address, size, data.
///
/// The memory size of the location must be the length of `data`
pub fn make_request(location: &MemoryLocation, data: &[u8]) -> UdsResult<Request> {
    if location.memorysize() != data.len() as u64 {
        return Err(UdsError::InvalidParameter(format!(
            "Memory location size ({}) does not match the data length ({})",
            location.memorysize(),
            data.len()
        )));
    }
    let mut payload = vec![location.alfid().get_byte()];
    payload.extend(location.address_bytes());
    payload.extend(location.memorysize_bytes());
    payload.extend_from_slice(data);
    Request::new(Service::WriteMemoryByAddress, None, payload)
}

/// Decodes a WriteMemoryByAddress response: ALFID, address and size echo
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "ALFID echo")?;
    let alfid_echo = response.data[0];
    let alfid = AddressAndLengthFormatIdentifier::from_byte(alfid_echo)
        .map_err(|e| UdsError::invalid(response, e.to_string()))?;
    let needed = 1 + alfid.address_bytes() + alfid.memorysize_bytes();
    if response.data.len() < needed {
        return Err(UdsError::invalid(
            response,
            format!("Response should be at least {needed} bytes to echo the memory location"),
        ));
    }
    let addr_end = 1 + alfid.address_bytes();
    let address = read_be_uint(&response.data[1..addr_end], alfid.address_bytes())?;
    let memorysize = read_be_uint(&response.data[addr_end..needed], alfid.memorysize_bytes())?;
    let memory_location_echo = MemoryLocation::new(
        address,
        memorysize,
        Some(alfid.address_format()),
        Some(alfid.memorysize_format()),
    )?;
    response.service_data = Some(
        WriteMemoryByAddressData {
            alfid_echo,
            memory_location_echo,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Writes a block of memory. The memory size of the location is the length of `data`
    pub fn write_memory_by_address(
        &mut self,
        location: MemoryLocation,
        data: &[u8],
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let cfg = client.config();
            let location = location
                .with_default_formats(cfg.server_address_format, cfg.server_memorysize_format)?;
            let req = make_request(&location, data)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response.service_data::<WriteMemoryByAddressData>().copied();
            let response = check_echo(
                response,
                "ALFID",
                echo.map(|e| e.alfid_echo),
                location.alfid().get_byte(),
            )?;
            let response = check_echo(
                response,
                "memory address",
                echo.map(|e| e.memory_location_echo.address()),
                location.address(),
            )?;
            check_echo(
                response,
                "memory size",
                echo.map(|e| e.memory_location_echo.memorysize()),
                location.memorysize(),
            )
            .map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        let loc = MemoryLocation::new(0x1234, 3, Some(16), Some(8)).unwrap();
        assert_eq!(
            make_request(&loc, &[1, 2, 3]).unwrap().get_payload(),
            vec![0x3D, 0x12, 0x12, 0x34, 0x03, 0x01, 0x02, 0x03]
        );
        assert!(make_request(&loc, &[1, 2]).is_err());
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x7D, 0x12, 0x12, 0x34, 0x03]);
        interpret_response(&mut r).unwrap();
        let d = r.service_data::<WriteMemoryByAddressData>().unwrap();
        assert_eq!(d.alfid_echo, 0x12);
        assert_eq!(d.memory_location_echo.address(), 0x1234);
        assert_eq!(d.memory_location_echo.memorysize(), 3);

        let mut r = Response::from_payload(&[0x7D, 0x12, 0x12, 0x34]);
        assert!(interpret_response(&mut r).is_err());
        let mut r = Response::from_payload(&[0x7D, 0x00]);
        assert!(interpret_response(&mut r).is_err());
    }
}
