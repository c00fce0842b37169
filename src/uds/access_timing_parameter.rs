//! Provides methods to read and modify the timing parameters of the active communication link

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Timing parameter access types
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TimingAccessType {
    /// Reads the extended timing parameter set
    ReadExtendedTimingParameterSet = 0x01,
    /// Restores the default timing parameters
    SetTimingParametersToDefaultValues = 0x02,
    /// Reads the timing parameters currently active
    ReadCurrentlyActiveTimingParameters = 0x03,
    /// Sets the timing parameters to the given values
    SetTimingParametersToGivenValues = 0x04,
}

impl From<TimingAccessType> for u8 {
    fn from(t: TimingAccessType) -> Self {
        t as u8
    }
}

/// Decoded AccessTimingParameter response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTimingParameterData {
    /// Access type echoed by the server
    pub access_type_echo: u8,
    /// Timing parameters, for the read access types
    pub timing_param_record: Option<Vec<u8>>,
}

/// Builds an AccessTimingParameter request.
///
/// ## Parameters
/// * access_type - See [TimingAccessType]
/// * timing_param_record - Timing parameters. Required for
///   [TimingAccessType::SetTimingParametersToGivenValues], forbidden otherwise
pub fn make_request(access_type: u8, timing_param_record: Option<&[u8]>) -> UdsResult<Request> {
    let set_values = access_type == TimingAccessType::SetTimingParametersToGivenValues as u8;
    match (set_values, timing_param_record) {
        (true, None) => Err(UdsError::InvalidParameter(
            "A timing_param_record must be given when access type is SetTimingParametersToGivenValues".into(),
        )),
        (false, Some(_)) => Err(UdsError::InvalidParameter(
            "timing_param_record can only be given when access type is SetTimingParametersToGivenValues".into(),
        )),
        (_, record) => Request::new(
            Service::AccessTimingParameter,
            Some(access_type),
            record.map(|r| r.to_vec()).unwrap_or_default(),
        ),
    }
}

/// Decodes an AccessTimingParameter response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "access type echo")?;
    let access_type_echo = response.data[0];
    let reads = access_type_echo == TimingAccessType::ReadExtendedTimingParameterSet as u8
        || access_type_echo == TimingAccessType::ReadCurrentlyActiveTimingParameters as u8;
    let timing_param_record = reads.then(|| response.data[1..].to_vec());
    response.service_data = Some(
        AccessTimingParameterData {
            access_type_echo,
            timing_param_record,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Reads or modifies the timing parameters. See [make_request]
    pub fn access_timing_parameter(
        &mut self,
        access_type: u8,
        timing_param_record: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(access_type, timing_param_record)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<AccessTimingParameterData>()
                .map(|d| d.access_type_echo);
            check_echo(response, "access type", echo, access_type).map(Some)
        })
    }

    /// Reads the timing parameters currently active
    pub fn read_active_timing_parameters(&mut self) -> UdsResult<Option<Response>> {
        self.access_timing_parameter(
            TimingAccessType::ReadCurrentlyActiveTimingParameters.into(),
            None,
        )
    }

    /// Reads the extended timing parameter set
    pub fn read_extended_timing_parameters(&mut self) -> UdsResult<Option<Response>> {
        self.access_timing_parameter(TimingAccessType::ReadExtendedTimingParameterSet.into(), None)
    }

    /// Restores the default timing parameters
    pub fn reset_default_timing_parameters(&mut self) -> UdsResult<Option<Response>> {
        self.access_timing_parameter(
            TimingAccessType::SetTimingParametersToDefaultValues.into(),
            None,
        )
    }

    /// Sets the timing parameters
    pub fn set_timing_parameters(&mut self, record: &[u8]) -> UdsResult<Option<Response>> {
        self.access_timing_parameter(
            TimingAccessType::SetTimingParametersToGivenValues.into(),
            Some(record),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(make_request(0x01, None).unwrap().get_payload(), vec![0x83, 0x01]);
        assert_eq!(
            make_request(0x04, Some(&[0x11, 0x22])).unwrap().get_payload(),
            vec![0x83, 0x04, 0x11, 0x22]
        );
        assert!(make_request(0x04, None).is_err());
        assert!(make_request(0x03, Some(&[0x11])).is_err());
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0xC3, 0x03, 0xAA, 0xBB]);
        interpret_response(&mut r).unwrap();
        let d = r.service_data::<AccessTimingParameterData>().unwrap();
        assert_eq!(d.timing_param_record, Some(vec![0xAA, 0xBB]));

        let mut r = Response::from_payload(&[0xC3, 0x02]);
        interpret_response(&mut r).unwrap();
        let d = r.service_data::<AccessTimingParameterData>().unwrap();
        assert_eq!(d.timing_param_record, None);
    }
}
