//! Provides methods to change the diagnostic session of the ECU

use std::time::Duration;

use crate::{
    StandardVersion, UdsClient, UdsError, UdsResult,
    channel::Connection,
    client::SessionTiming,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Standard diagnostic sessions. Any session from 0 to 0x7F can be requested
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Session {
    /// Session the ECU starts in
    DefaultSession = 0x01,
    /// Session used for reprogramming the ECU
    ProgrammingSession = 0x02,
    /// Session unlocking extended diagnostic functions
    ExtendedDiagnosticSession = 0x03,
    /// Session for testing safety related systems
    SafetySystemDiagnosticSession = 0x04,
}

impl From<Session> for u8 {
    fn from(s: Session) -> Self {
        s as u8
    }
}

/// Decoded DiagnosticSessionControl response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSessionControlData {
    /// Session echoed by the server
    pub session_echo: u8,
    /// Raw session parameter record
    pub session_param_records: Vec<u8>,
    /// Server P2 max (Standard 2013 and later)
    pub p2_server_max: Option<Duration>,
    /// Server P2* max (Standard 2013 and later)
    pub p2_star_server_max: Option<Duration>,
}

/// Builds a DiagnosticSessionControl request
pub fn make_request(session: u8) -> UdsResult<Request> {
    Request::new(Service::DiagnosticSessionControl, Some(session), Vec::new())
}

/// Decodes a DiagnosticSessionControl response.
///
/// From standard 2013, the response carries P2 (In ms) and P2* (In 10 ms units)
pub fn interpret_response(response: &mut Response, standard_version: StandardVersion) -> UdsResult<()> {
    require_len(response, 1, "session echo")?;
    let data = &response.data;
    let mut res = DiagnosticSessionControlData {
        session_echo: data[0],
        session_param_records: data[1..].to_vec(),
        p2_server_max: None,
        p2_star_server_max: None,
    };
    if standard_version >= StandardVersion::V2013 {
        if data.len() < 5 {
            return Err(UdsError::invalid(
                response,
                "Response data must be at least 5 bytes long to contain P2 and P2* timing values",
            ));
        }
        let p2 = u16::from_be_bytes([data[1], data[2]]);
        let p2_star = u16::from_be_bytes([data[3], data[4]]);
        res.p2_server_max = Some(Duration::from_millis(p2 as u64));
        res.p2_star_server_max = Some(Duration::from_millis(p2_star as u64 * 10));
    }
    response.service_data = Some(res.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Requests the ECU to go into a specific diagnostic session mode.
    ///
    /// When [crate::ClientConfig::use_server_timing] is set, the P2 and P2* values returned by the
    /// server are used for the following requests
    ///
    /// ## Parameters
    /// * session - Session to change to. See [Session]
    pub fn change_session(&mut self, session: u8) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(session)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response, client.config().standard_version)?;
            let data = response.service_data::<DiagnosticSessionControlData>().cloned();
            let response = check_echo(
                response,
                "session",
                data.as_ref().map(|d| d.session_echo),
                session,
            )?;
            if let Some(d) = data {
                if client.config().use_server_timing && d.p2_server_max.is_some() {
                    client.set_session_timing(SessionTiming {
                        p2_server_max: d.p2_server_max,
                        p2_star_server_max: d.p2_star_server_max,
                    });
                }
            }
            Ok(Some(response))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(make_request(0x03).unwrap().get_payload(), vec![0x10, 0x03]);
        assert_eq!(
            make_request(Session::ProgrammingSession.into()).unwrap().get_payload(),
            vec![0x10, 0x02]
        );
        assert!(make_request(0x80).is_err());
    }

    #[test]
    fn response_2013() {
        let mut r = Response::from_payload(&[0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]);
        interpret_response(&mut r, StandardVersion::V2013).unwrap();
        let d = r.service_data::<DiagnosticSessionControlData>().unwrap();
        assert_eq!(d.session_echo, 1);
        assert_eq!(d.p2_server_max, Some(Duration::from_millis(50)));
        assert_eq!(d.p2_star_server_max, Some(Duration::from_millis(5000)));
    }

    #[test]
    fn response_2006() {
        let mut r = Response::from_payload(&[0x50, 0x01, 0x99]);
        interpret_response(&mut r, StandardVersion::V2006).unwrap();
        let d = r.service_data::<DiagnosticSessionControlData>().unwrap();
        assert_eq!(d.session_param_records, vec![0x99]);
        assert_eq!(d.p2_server_max, None);

        let mut r = Response::from_payload(&[0x50, 0x01, 0x99]);
        assert!(matches!(
            interpret_response(&mut r, StandardVersion::V2020),
            Err(UdsError::InvalidResponse { .. })
        ));
    }
}
