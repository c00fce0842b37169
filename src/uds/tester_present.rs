//! Tester present, used to keep a non default diagnostic session alive

use crate::{
    UdsClient, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Decoded TesterPresent response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TesterPresentData {
    /// Subfunction echoed by the server. Always 0
    pub subfunction_echo: u8,
}

/// Builds a TesterPresent request
pub fn make_request() -> UdsResult<Request> {
    Request::new(Service::TesterPresent, Some(0), Vec::new())
}

/// Decodes a TesterPresent response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "subfunction echo")?;
    response.service_data = Some(
        TesterPresentData {
            subfunction_echo: response.data[0],
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Tells the ECU a client is still connected
    pub fn tester_present(&mut self) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request()?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<TesterPresentData>()
                .map(|d| d.subfunction_echo);
            check_echo(response, "subfunction", echo, 0u8).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(make_request().unwrap().get_payload(), vec![0x3E, 0x00]);
        assert_eq!(
            make_request().unwrap().get_payload_with_spr(true).unwrap(),
            vec![0x3E, 0x80]
        );
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0x7E, 0x00]);
        interpret_response(&mut r).unwrap();
        assert_eq!(r.service_data::<TesterPresentData>().unwrap().subfunction_echo, 0);
        let mut r = Response::from_payload(&[0x7E]);
        assert!(interpret_response(&mut r).is_err());
    }
}
