//! Provides methods to enable or disable the transmission and reception of messages by the ECU

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    communication::CommunicationType,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Standard communication control types
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlType {
    /// Enables Rx and Tx
    EnableRxAndTx = 0x00,
    /// Enables Rx, disables Tx
    EnableRxAndDisableTx = 0x01,
    /// Disables Rx, enables Tx
    DisableRxAndEnableTx = 0x02,
    /// Disables Rx and Tx
    DisableRxAndTx = 0x03,
    /// Enables Rx, disables Tx for the node given by its id
    EnableRxAndDisableTxWithEnhancedAddressInformation = 0x04,
    /// Enables Rx and Tx for the node given by its id
    EnableRxAndTxWithEnhancedAddressInformation = 0x05,
}

impl From<ControlType> for u8 {
    fn from(c: ControlType) -> Self {
        c as u8
    }
}

fn needs_node_id(control_type: u8) -> bool {
    control_type == ControlType::EnableRxAndDisableTxWithEnhancedAddressInformation as u8
        || control_type == ControlType::EnableRxAndTxWithEnhancedAddressInformation as u8
}

/// Decoded CommunicationControl response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommunicationControlData {
    /// Control type echoed by the server
    pub control_type_echo: u8,
}

/// Builds a CommunicationControl request.
///
/// ## Parameters
/// * control_type - See [ControlType]
/// * communication_type - Messages and subnets affected
/// * node_id - Node identification number. Required for control types 0x04 and 0x05, forbidden otherwise
pub fn make_request(
    control_type: u8,
    communication_type: CommunicationType,
    node_id: Option<u16>,
) -> UdsResult<Request> {
    let mut data = vec![communication_type.get_byte()];
    match (needs_node_id(control_type), node_id) {
        (true, Some(id)) => data.extend_from_slice(&id.to_be_bytes()),
        (true, None) => {
            return Err(UdsError::InvalidParameter(format!(
                "A node_id must be given for control type 0x{control_type:02X}"
            )));
        }
        (false, Some(_)) => {
            return Err(UdsError::InvalidParameter(format!(
                "node_id is only used by control types 0x04 and 0x05, got 0x{control_type:02X}"
            )));
        }
        (false, None) => {}
    }
    Request::new(Service::CommunicationControl, Some(control_type), data)
}

/// Decodes a CommunicationControl response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "control type echo")?;
    response.service_data = Some(
        CommunicationControlData {
            control_type_echo: response.data[0],
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Switches the transmission and reception of messages on or off.
    /// See [make_request] for the parameters
    pub fn communication_control(
        &mut self,
        control_type: u8,
        communication_type: CommunicationType,
        node_id: Option<u16>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(control_type, communication_type, node_id)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<CommunicationControlData>()
                .map(|d| d.control_type_echo);
            check_echo(response, "control type", echo, control_type).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        let ct = CommunicationType::new(0, true, true).unwrap();
        assert_eq!(
            make_request(ControlType::DisableRxAndTx.into(), ct, None)
                .unwrap()
                .get_payload(),
            vec![0x28, 0x03, 0x03]
        );
        assert_eq!(
            make_request(0x04, ct, Some(0x1234)).unwrap().get_payload(),
            vec![0x28, 0x04, 0x03, 0x12, 0x34]
        );
        assert!(make_request(0x04, ct, None).is_err());
        assert!(make_request(0x01, ct, Some(1)).is_err());
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x68, 0x03]);
        interpret_response(&mut r).unwrap();
        assert_eq!(
            r.service_data::<CommunicationControlData>().unwrap().control_type_echo,
            0x03
        );
    }
}
