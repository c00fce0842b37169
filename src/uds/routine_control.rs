//! Provides methods to start, stop and query routines on the ECU

use crate::{
    UdsClient, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Routine control types
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RoutineControlType {
    /// Starts a routine
    StartRoutine = 0x01,
    /// Stops a running routine
    StopRoutine = 0x02,
    /// Requests the results of a routine
    RequestRoutineResults = 0x03,
}

impl From<RoutineControlType> for u8 {
    fn from(t: RoutineControlType) -> Self {
        t as u8
    }
}

/// Decoded RoutineControl response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineControlData {
    /// Control type echoed by the server
    pub control_type_echo: u8,
    /// Routine id echoed by the server
    pub routine_id_echo: u16,
    /// Routine info and status record
    pub routine_status_record: Vec<u8>,
}

/// Builds a RoutineControl request
pub fn make_request(
    control_type: RoutineControlType,
    routine_id: u16,
    option_record: Option<&[u8]>,
) -> UdsResult<Request> {
    let mut data = routine_id.to_be_bytes().to_vec();
    if let Some(r) = option_record {
        data.extend_from_slice(r);
    }
    Request::new(Service::RoutineControl, Some(control_type.into()), data)
}

/// Decodes a RoutineControl response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 3, "control type and routine id echo")?;
    let d = &response.data;
    let data = RoutineControlData {
        control_type_echo: d[0],
        routine_id_echo: u16::from_be_bytes([d[1], d[2]]),
        routine_status_record: d[3..].to_vec(),
    };
    response.service_data = Some(data.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Sends a RoutineControl request
    pub fn routine_control(
        &mut self,
        control_type: RoutineControlType,
        routine_id: u16,
        option_record: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(control_type, routine_id, option_record)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let data = response.service_data::<RoutineControlData>();
            let type_echo = data.map(|d| d.control_type_echo);
            let id_echo = data.map(|d| d.routine_id_echo);
            let response = check_echo(response, "control type", type_echo, u8::from(control_type))?;
            check_echo(response, "routine id", id_echo, routine_id).map(Some)
        })
    }

    /// Starts a routine
    pub fn start_routine(&mut self, routine_id: u16, option_record: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.routine_control(RoutineControlType::StartRoutine, routine_id, option_record)
    }

    /// Stops a routine
    pub fn stop_routine(&mut self, routine_id: u16, option_record: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.routine_control(RoutineControlType::StopRoutine, routine_id, option_record)
    }

    /// Gets the results of a routine
    pub fn get_routine_result(&mut self, routine_id: u16, option_record: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.routine_control(RoutineControlType::RequestRoutineResults, routine_id, option_record)
    }
}
