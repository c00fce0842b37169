//! Provides methods to write data identifiers (DIDs) to the ECU

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    did::{DidConfig, DidValue},
    uds::{Request, Response, Service, check_echo},
};

/// Decoded WriteDataByIdentifier response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WriteDataByIdentifierData {
    /// DID echoed by the server
    pub did_echo: u16,
}

/// Builds a WriteDataByIdentifier request. The value is encoded with the DID's codec
pub fn make_request(did: u16, value: &DidValue, config: &DidConfig) -> UdsResult<Request> {
    let codec = config.fetch(did)?;
    let encoded = codec.encode(value).map_err(|e| {
        UdsError::InvalidParameter(format!(
            "Cannot encode value of data identifier 0x{did:04X}: {e}"
        ))
    })?;
    let mut data = did.to_be_bytes().to_vec();
    data.extend(encoded);
    Request::new(Service::WriteDataByIdentifier, None, data)
}

/// Decodes a WriteDataByIdentifier response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    if response.data.len() < 2 {
        return Err(UdsError::invalid(
            response,
            "Response must be at least 2 bytes long",
        ));
    }
    let did_echo = u16::from_be_bytes([response.data[0], response.data[1]]);
    response.service_data = Some(WriteDataByIdentifierData { did_echo }.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Writes a data identifier
    pub fn write_data_by_identifier(&mut self, did: u16, value: &DidValue) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(did, value, &client.config().data_identifiers)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<WriteDataByIdentifierData>()
                .map(|d| d.did_echo);
            check_echo(response, "data identifier", echo, did).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::did::PackCodec;

    #[test]
    fn request() {
        let cfg = DidConfig::new().with(0x1234, PackCodec::new(">HB").unwrap());
        let v = DidValue::List(vec![DidValue::UInt(0x0102), DidValue::UInt(0x03)]);
        assert_eq!(
            make_request(0x1234, &v, &cfg).unwrap().get_payload(),
            vec![0x2E, 0x12, 0x34, 0x01, 0x02, 0x03]
        );
        assert!(matches!(
            make_request(0x1234, &DidValue::from("x"), &cfg),
            Err(UdsError::InvalidParameter(_))
        ));
        assert!(matches!(
            make_request(0x4321, &v, &cfg),
            Err(UdsError::Config { .. })
        ));
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x6E, 0x12, 0x34]);
        interpret_response(&mut r).unwrap();
        assert_eq!(
            r.service_data::<WriteDataByIdentifierData>().unwrap().did_echo,
            0x1234
        );
        let mut r = Response::from_payload(&[0x6E, 0x12]);
        assert!(interpret_response(&mut r).is_err());
    }
}
