//! Provides methods to stop or resume the update of DTC status bits by the ECU

use crate::{
    UdsClient, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Standard DTC setting types
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DtcSettingType {
    /// Resume updating DTC status bits
    On = 0x01,
    /// Stop updating DTC status bits
    Off = 0x02,
}

impl From<DtcSettingType> for u8 {
    fn from(s: DtcSettingType) -> Self {
        s as u8
    }
}

/// Decoded ControlDTCSetting response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControlDtcSettingData {
    /// Setting type echoed by the server
    pub setting_type_echo: u8,
}

/// Builds a ControlDTCSetting request.
///
/// ## Parameters
/// * setting_type - See [DtcSettingType]
/// * option_record - Optional DTCSettingControlOptionRecord
pub fn make_request(setting_type: u8, option_record: Option<&[u8]>) -> UdsResult<Request> {
    Request::new(
        Service::ControlDTCSetting,
        Some(setting_type),
        option_record.map(|d| d.to_vec()).unwrap_or_default(),
    )
}

/// Decodes a ControlDTCSetting response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 1, "setting type echo")?;
    response.service_data = Some(
        ControlDtcSettingData {
            setting_type_echo: response.data[0],
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Stops or resumes the update of DTC status bits
    pub fn control_dtc_setting(
        &mut self,
        setting_type: u8,
        option_record: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(setting_type, option_record)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response
                .service_data::<ControlDtcSettingData>()
                .map(|d| d.setting_type_echo);
            check_echo(response, "setting type", echo, setting_type).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request() {
        assert_eq!(
            make_request(DtcSettingType::Off.into(), None).unwrap().get_payload(),
            vec![0x85, 0x02]
        );
        assert_eq!(
            make_request(0x01, Some(&[0x11, 0x22, 0x33])).unwrap().get_payload(),
            vec![0x85, 0x01, 0x11, 0x22, 0x33]
        );
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[0xC5, 0x02]);
        interpret_response(&mut r).unwrap();
        assert_eq!(
            r.service_data::<ControlDtcSettingData>().unwrap().setting_type_echo,
            0x02
        );
    }
}
