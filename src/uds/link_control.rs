//! Provides methods to change the baudrate of the communication link

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    communication::{Baudrate, BaudrateKind},
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Link control types
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LinkControlType {
    /// Checks a transition to a fixed baudrate is possible
    VerifyBaudrateTransitionWithFixedBaudrate = 0x01,
    /// Checks a transition to a specific baudrate is possible
    VerifyBaudrateTransitionWithSpecificBaudrate = 0x02,
    /// Performs the verified transition
    TransitionBaudrate = 0x03,
}

impl From<LinkControlType> for u8 {
    fn from(t: LinkControlType) -> Self {
        t as u8
    }
}

/// Decoded LinkControl response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LinkControlData {
    /// Control type echoed by the server
    pub control_type_echo: u8,
}

/// Builds a LinkControl request.
///
/// ## Parameters
/// * control_type - See [LinkControlType]
/// * baudrate - Required for the verify control types. It is converted to the encoding
///   the control type needs (Fixed for 0x01, Specific for 0x02). Forbidden for 0x03
pub fn make_request(control_type: u8, baudrate: Option<Baudrate>) -> UdsResult<Request> {
    let kind = match LinkControlType::from_repr(control_type) {
        Some(LinkControlType::VerifyBaudrateTransitionWithFixedBaudrate) => Some(BaudrateKind::Fixed),
        Some(LinkControlType::VerifyBaudrateTransitionWithSpecificBaudrate) => {
            Some(BaudrateKind::Specific)
        }
        _ => None,
    };
    let data = match (kind, baudrate) {
        (Some(kind), Some(b)) => {
            let b = if b.effective_kind() == kind { b } else { b.to_kind(kind)? };
            b.get_bytes()
        }
        (Some(_), None) => {
            return Err(UdsError::InvalidParameter(format!(
                "A baudrate must be given for control type 0x{control_type:02X}"
            )));
        }
        (None, Some(b)) if control_type == LinkControlType::TransitionBaudrate as u8 => {
            return Err(UdsError::InvalidParameter(format!(
                "Baudrate {} cannot be given with control type TransitionBaudrate",
                b.baudrate()
            )));
        }
        (None, b) => b.map(|b| b.get_bytes()).unwrap_or_default(),
    };
    Request::new(Service::LinkControl, Some(control_type), data)
}

/// Decodes a LinkControl response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "control type echo")?;
    response.service_data = Some(
        LinkControlData {
            control_type_echo: response.data[0],
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Verifies or performs a baudrate transition. See [make_request]
    pub fn link_control(
        &mut self,
        control_type: u8,
        baudrate: Option<Baudrate>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(control_type, baudrate)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<LinkControlData>()
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
        let b = Baudrate::new(500_000, BaudrateKind::Auto).unwrap();
        assert_eq!(
            make_request(0x01, Some(b)).unwrap().get_payload(),
            vec![0x87, 0x01, 0x12]
        );
        assert_eq!(
            make_request(0x02, Some(b)).unwrap().get_payload(),
            vec![0x87, 0x02, 0x07, 0xA1, 0x20]
        );
        assert_eq!(make_request(0x03, None).unwrap().get_payload(), vec![0x87, 0x03]);
        assert!(make_request(0x01, None).is_err());
        assert!(make_request(0x03, Some(b)).is_err());
        let odd = Baudrate::new(123_456, BaudrateKind::Specific).unwrap();
        assert!(make_request(0x01, Some(odd)).is_err());
    }
}
