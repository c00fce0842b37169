//! Provides methods to request a download to, or an upload from, the ECU

use log::debug;

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    memory::{DataFormatIdentifier, MemoryLocation},
    read_be_uint,
    uds::{Request, Response, Service, require_len},
};

/// Decoded RequestDownload or RequestUpload response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferRequestData {
    /// Maximum length of a TransferData request, including the service id and sequence number
    pub max_length: u64,
}

/// Builds a RequestDownload or RequestUpload request: DFI, ALFID, address, size
pub fn make_request(
    service: Service,
    location: &MemoryLocation,
    dfi: Option<DataFormatIdentifier>,
) -> UdsResult<Request> {
    if !matches!(service, Service::RequestDownload | Service::RequestUpload) {
        return Err(UdsError::InvalidParameter(format!(
            "{service:?} is not a transfer request service"
        )));
    }
    let mut data = vec![dfi.unwrap_or_default().get_byte(), location.alfid().get_byte()];
    data.extend(location.address_bytes());
    data.extend(location.memorysize_bytes());
    Request::new(service, None, data)
}

/// Decodes a RequestDownload or RequestUpload response.
///
/// The high nibble of the first byte is the width of the max length field
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "length format identifier")?;
    let width = (response.data[0] >> 4) as usize;
    if width > 8 {
        return Err(UdsError::NotImplemented(format!(
            "This client does not support number bigger than 64 bits, but the server announced a max length of {width} bytes"
        )));
    }
    if response.data.len() < 1 + width {
        return Err(UdsError::invalid(
            response,
            format!("Length format identifier announces {width} bytes but the response is too short"),
        ));
    }
    let max_length = read_be_uint(&response.data[1..1 + width], width)?;
    response.service_data = Some(TransferRequestData { max_length }.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    fn request_transfer(
        &mut self,
        service: Service,
        location: MemoryLocation,
        dfi: Option<DataFormatIdentifier>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let cfg = client.config();
            let location = location
                .with_default_formats(cfg.server_address_format, cfg.server_memorysize_format)?;
            let req = make_request(service, &location, dfi)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            if let Some(d) = response.service_data::<TransferRequestData>() {
                debug!("Server accepts blocks of up to {} bytes", d.max_length);
            }
            Ok(Some(response))
        })
    }

    /// Requests a download of data to the ECU at `location`
    pub fn request_download(
        &mut self,
        location: MemoryLocation,
        dfi: Option<DataFormatIdentifier>,
    ) -> UdsResult<Option<Response>> {
        self.request_transfer(Service::RequestDownload, location, dfi)
    }

    /// Requests an upload of the data of the ECU at `location`
    pub fn request_upload(
        &mut self,
        location: MemoryLocation,
        dfi: Option<DataFormatIdentifier>,
    ) -> UdsResult<Option<Response>> {
        self.request_transfer(Service::RequestUpload, location, dfi)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        let loc = MemoryLocation::new(0x1234, 0xFF, Some(16), Some(8)).unwrap();
        assert_eq!(
            make_request(Service::RequestDownload, &loc, None)
                .unwrap()
                .get_payload(),
            vec![0x34, 0x00, 0x12, 0x12, 0x34, 0xFF]
        );
        let dfi = DataFormatIdentifier::new(1, 2).unwrap();
        assert_eq!(
            make_request(Service::RequestUpload, &loc, Some(dfi))
                .unwrap()
                .get_payload(),
            vec![0x35, 0x12, 0x12, 0x12, 0x34, 0xFF]
        );
        assert!(make_request(Service::TransferData, &loc, None).is_err());
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x74, 0x20, 0x0F, 0xFF]);
        interpret_response(&mut r).unwrap();
        assert_eq!(r.service_data::<TransferRequestData>().unwrap().max_length, 0xFFF);

        let mut r = Response::from_payload(&[0x74, 0x20, 0x0F]);
        assert!(matches!(interpret_response(&mut r), Err(UdsError::InvalidResponse { .. })));

        let mut r = Response::from_payload(&[0x74, 0x90, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(matches!(interpret_response(&mut r), Err(UdsError::NotImplemented(_))));
    }
}
