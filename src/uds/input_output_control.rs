//! Provides methods to take control of ECU inputs and outputs

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    did::{CodecLength, DidValue, IoConfig, IoConfigEntry, IoMasks},
    uds::{Request, Response, Service, check_echo, check_padding, require_len},
};

/// Input output control parameters
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum IoControlParameter {
    /// Gives control back to the ECU
    ReturnControlToEcu = 0x00,
    /// Resets the IO to its default state
    ResetToDefault = 0x01,
    /// Freezes the IO in its current state
    FreezeCurrentState = 0x02,
    /// Sets the IO to the given state
    ShortTermAdjustment = 0x03,
}

impl From<IoControlParameter> for u8 {
    fn from(p: IoControlParameter) -> Self {
        p as u8
    }
}

/// Decoded InputOutputControlByIdentifier response
#[derive(Debug, Clone, PartialEq)]
pub struct IoControlData {
    /// DID echoed by the server
    pub did_echo: u16,
    /// Control parameter echoed by the server, when one was requested
    pub control_param_echo: Option<u8>,
    /// Control state decoded with the DID codec
    pub control_state: Option<DidValue>,
    /// Raw control state
    pub raw_control_state: Vec<u8>,
}

fn io_entry<'a>(config: &'a IoConfig, did: u16) -> UdsResult<&'a IoConfigEntry> {
    config.get(did).ok_or_else(|| {
        UdsError::config(
            Some(did),
            format!(
                "Actual Input/Output configuration contains no definition for data identifier 0x{did:04X}"
            ),
        )
    })
}

/// Builds an InputOutputControlByIdentifier request.
///
/// ## Parameters
/// * did - Data identifier of the IO
/// * control_param - Optional control parameter
/// * values - Optional control state, encoded with the codec of the DID in `config`
/// * masks - Optional control enable mask, see [IoMasks]
pub fn make_request(
    did: u16,
    control_param: Option<IoControlParameter>,
    values: Option<&DidValue>,
    masks: Option<&IoMasks>,
    config: &IoConfig,
) -> UdsResult<Request> {
    let mut data = did.to_be_bytes().to_vec();
    if let Some(p) = control_param {
        data.push(p.into());
    }
    if let Some(v) = values {
        let entry = io_entry(config, did)?;
        let encoded = entry.codec.encode(v).map_err(|e| {
            UdsError::InvalidParameter(format!(
                "Cannot encode control state of data identifier 0x{did:04X}: {e}"
            ))
        })?;
        data.extend(encoded);
    }
    if let Some(m) = masks {
        let entry = io_entry(config, did)?;
        data.extend(entry.encode_masks(did, m)?);
    }
    Request::new(Service::InputOutputControlByIdentifier, None, data)
}

/// Decodes an InputOutputControlByIdentifier response.
///
/// `control_param_sent` tells whether the request carried a control parameter, which the
/// server echoes. The control state is decoded when the DID has an entry in `config`
pub fn interpret_response(
    response: &mut Response,
    control_param_sent: bool,
    config: &IoConfig,
    tolerate_zero_padding: bool,
) -> UdsResult<()> {
    require_len(response, 2, "data identifier echo")?;
    let did_echo = u16::from_be_bytes([response.data[0], response.data[1]]);
    let mut offset = 2;
    let control_param_echo = if control_param_sent {
        require_len(response, 3, "control parameter echo")?;
        offset += 1;
        Some(response.data[2])
    } else {
        None
    };
    let rest = &response.data[offset..];
    let mut control_state = None;
    let mut raw_control_state = rest.to_vec();
    if !rest.is_empty() {
        if let Some(entry) = config.get(did_echo) {
            let used = match entry.codec.length() {
                CodecLength::ReadAllRemaining => rest.len(),
                CodecLength::Fixed(n) => n,
            };
            if rest.len() < used {
                return Err(UdsError::invalid(
                    response,
                    format!("Control state of data identifier 0x{did_echo:04X} is incomplete"),
                ));
            }
            check_padding(response, &rest[used..], tolerate_zero_padding)?;
            raw_control_state.truncate(used);
            let value = entry.codec.decode(&rest[..used]).map_err(|e| {
                UdsError::invalid(
                    response,
                    format!("Cannot decode control state of data identifier 0x{did_echo:04X}: {e}"),
                )
            })?;
            control_state = Some(value);
        }
    }
    response.service_data = Some(
        IoControlData {
            did_echo,
            control_param_echo,
            control_state,
            raw_control_state,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Controls an input or output of the ECU. See [make_request]
    pub fn io_control(
        &mut self,
        did: u16,
        control_param: Option<IoControlParameter>,
        values: Option<&DidValue>,
        masks: Option<&IoMasks>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let config = client.config().input_output.clone();
            let tolerate = client.config().tolerate_zero_padding;
            let req = make_request(did, control_param, values, masks, &config)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response, control_param.is_some(), &config, tolerate)?;
            let data = response.service_data::<IoControlData>();
            let did_echo = data.map(|d| d.did_echo);
            let param_echo = data.and_then(|d| d.control_param_echo);
            let response = check_echo(response, "data identifier", did_echo, did)?;
            match control_param {
                Some(p) => check_echo(response, "control parameter", param_echo, u8::from(p)).map(Some),
                None => Ok(Some(response)),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::did::PackCodec;

    fn config() -> IoConfig {
        IoConfig::new().with(
            0x0456,
            IoConfigEntry::new(PackCodec::new(">BB").unwrap())
                .with_mask("led", 0x01)
                .with_mask("fan", 0x04)
                .with_mask_size(2),
        )
    }

    #[test]
    fn request() {
        let cfg = config();
        let values = DidValue::List(vec![DidValue::UInt(0x11), DidValue::UInt(0x22)]);
        assert_eq!(
            make_request(
                0x0456,
                Some(IoControlParameter::ShortTermAdjustment),
                Some(&values),
                Some(&IoMasks::select(["led", "fan"])),
                &cfg
            )
            .unwrap()
            .get_payload(),
            vec![0x2F, 0x04, 0x56, 0x03, 0x11, 0x22, 0x00, 0x05]
        );
        assert_eq!(
            make_request(0x0456, Some(IoControlParameter::ReturnControlToEcu), None, Some(&IoMasks::All), &cfg)
                .unwrap()
                .get_payload(),
            vec![0x2F, 0x04, 0x56, 0x00, 0xFF, 0xFF]
        );
        assert!(matches!(
            make_request(0x0456, None, None, Some(&IoMasks::select(["horn"])), &cfg),
            Err(UdsError::Config { .. })
        ));
        assert!(matches!(
            make_request(0x0999, None, Some(&values), None, &cfg),
            Err(UdsError::Config { key: Some(0x0999), .. })
        ));
    }

    #[test]
    fn response() {
        let cfg = config();
        let mut r = Response::from_payload(&[0x6F, 0x04, 0x56, 0x03, 0x11, 0x22]);
        interpret_response(&mut r, true, &cfg, false).unwrap();
        let d = r.service_data::<IoControlData>().unwrap();
        assert_eq!(d.did_echo, 0x0456);
        assert_eq!(d.control_param_echo, Some(0x03));
        assert_eq!(
            d.control_state,
            Some(DidValue::List(vec![DidValue::UInt(0x11), DidValue::UInt(0x22)]))
        );

        let mut r = Response::from_payload(&[0x6F, 0x04, 0x56, 0x11, 0x22, 0x00]);
        interpret_response(&mut r, false, &cfg, true).unwrap();
        assert_eq!(r.service_data::<IoControlData>().unwrap().raw_control_state, vec![0x11, 0x22]);
        let mut r = Response::from_payload(&[0x6F, 0x04, 0x56, 0x11, 0x22, 0x00]);
        assert!(interpret_response(&mut r, false, &cfg, false).is_err());

        let mut r = Response::from_payload(&[0x6F, 0x04, 0x56]);
        assert!(interpret_response(&mut r, true, &cfg, false).is_err());
    }
}
