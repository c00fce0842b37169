//! Provides methods to end a data transfer

use crate::{
    UdsClient, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service},
};

/// Decoded RequestTransferExit response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTransferExitData {
    /// Transfer response parameter record, empty if the server sent none
    pub parameter_records: Vec<u8>,
}

/// Builds a RequestTransferExit request
pub fn make_request(data: Option<&[u8]>) -> UdsResult<Request> {
    Request::new(
        Service::RequestTransferExit,
        None,
        data.map(<[u8]>::to_vec).unwrap_or_default(),
    )
}

/// Decodes a RequestTransferExit response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    response.service_data = Some(
        RequestTransferExitData {
            parameter_records: response.data.clone(),
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Ends a data transfer
    pub fn request_transfer_exit(&mut self, data: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(data)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            Ok(Some(response))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(make_request(None).unwrap().get_payload(), vec![0x37]);
        assert_eq!(
            make_request(Some(&[0x12, 0x34])).unwrap().get_payload(),
            vec![0x37, 0x12, 0x34]
        );
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x77]);
        interpret_response(&mut r).unwrap();
        assert!(
            r.service_data::<RequestTransferExitData>()
                .unwrap()
                .parameter_records
                .is_empty()
        );
        let mut r = Response::from_payload(&[0x77, 0x89, 0xAB]);
        interpret_response(&mut r).unwrap();
        assert_eq!(
            r.service_data::<RequestTransferExitData>().unwrap().parameter_records,
            vec![0x89, 0xAB]
        );
    }
}
