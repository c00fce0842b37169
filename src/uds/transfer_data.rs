//! Provides methods to transfer data blocks after a download or upload request

use crate::{
    UdsClient, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Decoded TransferData response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTransferData {
    /// Block sequence number echoed by the server
    pub sequence_number_echo: u8,
    /// Transfer response parameter record. Holds the uploaded block for an upload
    pub parameter_records: Vec<u8>,
}

/// Builds a TransferData request
pub fn make_request(sequence_number: u8, data: Option<&[u8]>) -> UdsResult<Request> {
    let mut payload = vec![sequence_number];
    if let Some(d) = data {
        payload.extend_from_slice(d);
    }
    Request::new(Service::TransferData, None, payload)
}

/// Decodes a TransferData response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "block sequence number echo")?;
    response.service_data = Some(
        BlockTransferData {
            sequence_number_echo: response.data[0],
            parameter_records: response.data[1..].to_vec(),
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Transfers a block of data. The sequence number starts at 1 and wraps to 0 after 0xFF
    pub fn transfer_data(&mut self, sequence_number: u8, data: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(sequence_number, data)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<BlockTransferData>()
                .map(|d| d.sequence_number_echo);
            check_echo(response, "block sequence number", echo, sequence_number).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(
            make_request(0x22, Some(&[0x12, 0x34])).unwrap().get_payload(),
            vec![0x36, 0x22, 0x12, 0x34]
        );
        assert_eq!(make_request(0x01, None).unwrap().get_payload(), vec![0x36, 0x01]);
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x76, 0x22, 0x89]);
        interpret_response(&mut r).unwrap();
        let d = r.service_data::<BlockTransferData>().unwrap();
        assert_eq!(d.sequence_number_echo, 0x22);
        assert_eq!(d.parameter_records, vec![0x89]);
    }
}
