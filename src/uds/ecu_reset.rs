//!  Provides methods to reset the ECU in order to simulate power cycling and resetting memory regions

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Standard reset types. Any type from 0 to 0x7F can be requested
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResetType {
    /// Simulates a power off/on cycle
    HardReset = 0x01,
    /// Simulates the driver turning the ignition off and on
    KeyOffOnReset = 0x02,
    /// Restarts the application
    SoftReset = 0x03,
    /// Enables the rapid power shutdown mode. The response carries the power down time
    EnableRapidPowerShutDown = 0x04,
    /// Disables the rapid power shutdown mode
    DisableRapidPowerShutDown = 0x05,
}

impl From<ResetType> for u8 {
    fn from(r: ResetType) -> Self {
        r as u8
    }
}

/// Decoded ECUReset response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EcuResetData {
    /// Reset type echoed by the server
    pub reset_type: u8,
    /// Minimum time (In seconds) the ECU stays in the power down sequence.
    /// Only sent for [ResetType::EnableRapidPowerShutDown]. 0xFF means failure or time not available
    pub powerdown_time: Option<u8>,
}

/// Builds an ECUReset request
pub fn make_request(reset_type: u8) -> UdsResult<Request> {
    Request::new(Service::ECUReset, Some(reset_type), Vec::new())
}

/// Decodes an ECUReset response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "reset type echo")?;
    let reset_type = response.data[0];
    let mut powerdown_time = None;
    if reset_type == ResetType::EnableRapidPowerShutDown as u8 {
        match response.data.get(1) {
            Some(t) => powerdown_time = Some(*t),
            None => {
                return Err(UdsError::invalid(
                    response,
                    "Response data must contain a power down time when reset type is EnableRapidPowerShutDown",
                ));
            }
        }
    }
    response.service_data = Some(
        EcuResetData {
            reset_type,
            powerdown_time,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Asks the ECU to perform a reset. See [ResetType]
    pub fn ecu_reset(&mut self, reset_type: u8) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(reset_type)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response.service_data::<EcuResetData>().map(|d| d.reset_type);
            check_echo(response, "reset type", echo, reset_type).map(Some)
        })
    }
}
