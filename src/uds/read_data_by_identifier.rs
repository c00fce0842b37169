//! Provides methods to read data identifiers (DIDs) from the ECU

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    did::{CodecLength, DidConfig, DidValue},
    uds::{Request, Response, Service},
};

/// Decoded ReadDataByIdentifier response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadDataByIdentifierData {
    /// Decoded values, in the order sent by the server
    pub values: Vec<(u16, DidValue)>,
}

impl ReadDataByIdentifierData {
    /// Value of a DID
    pub fn get(&self, did: u16) -> Option<&DidValue> {
        self.values.iter().find(|(d, _)| *d == did).map(|(_, v)| v)
    }

    /// Returns true if the response contains the DID
    pub fn contains(&self, did: u16) -> bool {
        self.get(did).is_some()
    }
}

/// Builds a ReadDataByIdentifier request.
///
/// Every DID needs a codec in `config`. A DID whose codec reads all remaining data must be
/// the last one requested
pub fn make_request(dids: &[u16], config: &DidConfig) -> UdsResult<Request> {
    if dids.is_empty() {
        return Err(UdsError::InvalidParameter(
            "At least one data identifier must be requested".into(),
        ));
    }
    let mut data = Vec::with_capacity(dids.len() * 2);
    for (i, did) in dids.iter().enumerate() {
        let codec = config.fetch(*did)?;
        if codec.length() == CodecLength::ReadAllRemaining && i != dids.len() - 1 {
            return Err(UdsError::InvalidParameter(format!(
                "Data identifier 0x{did:04X} is configured to read all remaining data, so it must be the last one requested"
            )));
        }
        data.extend_from_slice(&did.to_be_bytes());
    }
    Request::new(Service::ReadDataByIdentifier, None, data)
}

/// Decodes a ReadDataByIdentifier response.
///
/// The response is a sequence of (DID, value) pairs. The length of each value is given by
/// the DID's codec. Trailing zero padding is tolerated when `tolerate_zero_padding` is set
pub fn interpret_response(
    response: &mut Response,
    config: &DidConfig,
    tolerate_zero_padding: bool,
) -> UdsResult<()> {
    let data = &response.data;
    let mut values = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        if data.len() <= offset + 1 {
            if tolerate_zero_padding && data[data.len() - 1] == 0 {
                break;
            }
            return Err(UdsError::invalid(
                response,
                "Response given by server is incomplete.",
            ));
        }
        let did = u16::from_be_bytes([data[offset], data[offset + 1]]);
        if did == 0
            && !config.contains(did)
            && tolerate_zero_padding
            && data[offset..].iter().all(|b| *b == 0)
        {
            break;
        }
        let codec = config.fetch(did)?;
        offset += 2;
        let sub = match codec.length() {
            CodecLength::ReadAllRemaining => {
                let s = &data[offset..];
                offset = data.len();
                s
            }
            CodecLength::Fixed(len) => {
                if data.len() < offset + len {
                    return Err(UdsError::invalid(
                        response,
                        format!(
                            "Value for data identifier 0x{did:04X} was incomplete according to definition in configuration"
                        ),
                    ));
                }
                let s = &data[offset..offset + len];
                offset += len;
                s
            }
        };
        let value = codec.decode(sub).map_err(|e| {
            UdsError::invalid(
                response,
                format!("Cannot decode value of data identifier 0x{did:04X}: {e}"),
            )
        })?;
        values.push((did, value));
    }
    response.service_data = Some(ReadDataByIdentifierData { values }.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Reads one or more data identifiers.
    ///
    /// The decoded values are in [ReadDataByIdentifierData]
    pub fn read_data_by_identifier(&mut self, dids: &[u16]) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let config = client.config().data_identifiers.clone();
            let req = make_request(dids, &config)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            let tolerate = client.config().tolerate_zero_padding;
            match interpret_response(&mut response, &config, tolerate) {
                Ok(()) => {}
                Err(UdsError::Config { key: Some(did), .. }) if !dids.contains(&did) => {
                    return Err(UdsError::unexpected(
                        response,
                        format!(
                            "Server returned values for data identifier 0x{did:04X} that was not requested and no Codec was defined for it. Parsing must be stopped."
                        ),
                    ));
                }
                Err(e) => return Err(e),
            }
            let missing = response
                .service_data::<ReadDataByIdentifierData>()
                .and_then(|d| dids.iter().find(|did| !d.contains(**did)).copied());
            if let Some(did) = missing {
                return Err(UdsError::unexpected(
                    response,
                    format!("Server did not return a value for data identifier 0x{did:04X}"),
                ));
            }
            Ok(Some(response))
        })
    }

    /// Reads a single data identifier, and returns its value.
    ///
    /// `None` is returned when the error policy returned a negative, invalid or unexpected response
    pub fn read_data_by_identifier_first(&mut self, did: u16) -> UdsResult<Option<DidValue>> {
        let response = self.read_data_by_identifier(&[did])?;
        Ok(response.and_then(|r| {
            r.service_data::<ReadDataByIdentifierData>()
                .and_then(|d| d.get(did).cloned())
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::did::{AsciiCodec, PackCodec, RawCodec};

    fn config() -> DidConfig {
        DidConfig::new()
            .with(0x0001, PackCodec::new(">H").unwrap())
            .with(0x0002, PackCodec::new(">B").unwrap())
            .with(0xF190, AsciiCodec::new(3))
            .with(0x1000, RawCodec::read_all())
    }

    #[test]
    fn request() {
        let cfg = config();
        assert_eq!(
            make_request(&[0x0001, 0xF190], &cfg).unwrap().get_payload(),
            vec![0x22, 0x00, 0x01, 0xF1, 0x90]
        );
        assert!(make_request(&[], &cfg).is_err());
        assert!(matches!(
            make_request(&[0x0003], &cfg),
            Err(UdsError::Config { key: Some(3), .. })
        ));
        assert!(make_request(&[0x0001, 0x1000], &cfg).is_ok());
        assert!(make_request(&[0x1000, 0x0001], &cfg).is_err());
    }

    #[test]
    fn decode_multiple() {
        let cfg = config();
        let mut r = Response::from_payload(&[
            0x62, 0x00, 0x01, 0x12, 0x34, 0xF1, 0x90, b'A', b'B', b'C', 0x10, 0x00, 0x01, 0x02,
        ]);
        interpret_response(&mut r, &cfg, false).unwrap();
        let d = r.service_data::<ReadDataByIdentifierData>().unwrap();
        assert_eq!(d.get(0x0001), Some(&DidValue::UInt(0x1234)));
        assert_eq!(d.get(0xF190), Some(&DidValue::from("ABC")));
        assert_eq!(d.get(0x1000), Some(&DidValue::Bytes(vec![0x01, 0x02])));
    }

    #[test]
    fn zero_padding() {
        let cfg = config();
        for padding in [1usize, 2, 5] {
            let mut payload = vec![0x62, 0x00, 0x02, 0x55];
            payload.extend(std::iter::repeat_n(0u8, padding));
            let mut r = Response::from_payload(&payload);
            interpret_response(&mut r, &cfg, true).unwrap();
            let d = r.service_data::<ReadDataByIdentifierData>().unwrap();
            assert_eq!(d.values, vec![(0x0002, DidValue::UInt(0x55))]);

            let mut r = Response::from_payload(&payload);
            assert!(interpret_response(&mut r, &cfg, false).is_err());
        }
    }

    #[test]
    fn incomplete() {
        let cfg = config();
        let mut r = Response::from_payload(&[0x62, 0x00, 0x01, 0x12]);
        assert!(matches!(
            interpret_response(&mut r, &cfg, true),
            Err(UdsError::InvalidResponse { .. })
        ));
        let mut r = Response::from_payload(&[0x62, 0x00, 0x02, 0x12, 0x05]);
        assert!(matches!(
            interpret_response(&mut r, &cfg, true),
            Err(UdsError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn unknown_did_in_response() {
        let cfg = config();
        let mut r = Response::from_payload(&[0x62, 0x00, 0x02, 0x12, 0x00, 0x09, 0x00]);
        assert!(matches!(
            interpret_response(&mut r, &cfg, true),
            Err(UdsError::Config { key: Some(9), .. })
        ));
    }
}
