//! Module for UDS (Unified diagnostic services - ISO14229)
//!
//! Theoretically, this module should be compliant with any ECU which implements
//! UDS (Typically any ECU produced after 2006 supports this)
//!
//! Every service has its own module with a `make_request` function building the [Request], and
//! an `interpret_response` function decoding a [Response] into the service's typed data, stored in
//! [Response::service_data]. Both are pure functions. The matching [crate::UdsClient] method
//! sends the request, interprets the response and checks the fields echoed by the server.

use std::fmt;

use crate::{StandardVersion, UdsError, UdsResult};

pub mod access_timing_parameter;
pub mod authentication;
pub mod clear_diagnostic_information;
pub mod communication_control;
pub mod control_dtc_setting;
pub mod diagnostic_session_control;
pub mod dynamically_define_data_identifier;
pub mod ecu_reset;
pub mod input_output_control;
pub mod link_control;
pub mod read_data_by_identifier;
pub mod read_dtc_information;
pub mod read_memory_by_address;
pub mod read_scaling_data;
pub mod request_file_transfer;
pub mod request_transfer;
pub mod request_transfer_exit;
pub mod routine_control;
pub mod security_access;
pub mod tester_present;
pub mod transfer_data;
pub mod write_data_by_identifier;
pub mod write_memory_by_address;

pub use access_timing_parameter::{AccessTimingParameterData, TimingAccessType};
pub use authentication::{AuthenticationData, AuthenticationTask};
pub use communication_control::{CommunicationControlData, ControlType};
pub use control_dtc_setting::{ControlDtcSettingData, DtcSettingType};
pub use diagnostic_session_control::{DiagnosticSessionControlData, Session};
pub use dynamically_define_data_identifier::{DynamicDidSubfunction, DynamicallyDefineDidData};
pub use ecu_reset::{EcuResetData, ResetType};
pub use input_output_control::{IoControlData, IoControlParameter};
pub use link_control::{LinkControlData, LinkControlType};
pub use read_data_by_identifier::ReadDataByIdentifierData;
pub use read_dtc_information::{DtcReportType, ReadDtcInformationData};
pub use read_memory_by_address::ReadMemoryByAddressData;
pub use read_scaling_data::{ScalingByte, ScalingData, ScalingFormula, ScalingType};
pub use request_file_transfer::{FileTransferData, ModeOfOperation};
pub use request_transfer::TransferRequestData;
pub use request_transfer_exit::RequestTransferExitData;
pub use routine_control::{RoutineControlData, RoutineControlType};
pub use security_access::{SecurityAccessData, SecurityAccessType};
pub use tester_present::TesterPresentData;
pub use transfer_data::BlockTransferData;
pub use write_data_by_identifier::WriteDataByIdentifierData;
pub use write_memory_by_address::WriteMemoryByAddressData;

/// Service id used by a negative response
pub const NEGATIVE_RESPONSE_ID: u8 = 0x7F;

/// UDS services. The discriminant is the request service id
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::FromRepr,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Service {
    /// Diagnostic session control. See [diagnostic_session_control]
    DiagnosticSessionControl = 0x10,
    /// ECU Reset. See [ecu_reset]
    ECUReset = 0x11,
    /// Clears stored DTCs. See [clear_diagnostic_information]
    ClearDiagnosticInformation = 0x14,
    /// Reading and querying diagnostic trouble codes
    /// stored on the ECU. See [read_dtc_information]
    ReadDTCInformation = 0x19,
    /// See [read_data_by_identifier]
    ReadDataByIdentifier = 0x22,
    /// See [read_memory_by_address]
    ReadMemoryByAddress = 0x23,
    /// See [read_scaling_data]
    ReadScalingDataByIdentifier = 0x24,
    /// Security access. See [security_access]
    SecurityAccess = 0x27,
    /// Controls communication functionality of the ECU. See [communication_control]
    CommunicationControl = 0x28,
    /// See [authentication]
    Authentication = 0x29,
    /// No codec. Usable through [crate::UdsClient::send_request]
    ReadDataByPeriodicIdentifier = 0x2A,
    /// See [dynamically_define_data_identifier]
    DynamicallyDefineDataIdentifier = 0x2C,
    /// See [write_data_by_identifier]
    WriteDataByIdentifier = 0x2E,
    /// See [input_output_control]
    InputOutputControlByIdentifier = 0x2F,
    /// See [routine_control]
    RoutineControl = 0x31,
    /// See [request_transfer]
    RequestDownload = 0x34,
    /// See [request_transfer]
    RequestUpload = 0x35,
    /// See [transfer_data]
    TransferData = 0x36,
    /// See [request_transfer_exit]
    RequestTransferExit = 0x37,
    /// See [request_file_transfer]
    RequestFileTransfer = 0x38,
    /// See [write_memory_by_address]
    WriteMemoryByAddress = 0x3D,
    /// Tester present command. See [tester_present]
    TesterPresent = 0x3E,
    /// See [access_timing_parameter]
    AccessTimingParameter = 0x83,
    /// No codec. Usable through [crate::UdsClient::send_request]
    SecuredDataTransmission = 0x84,
    /// See [control_dtc_setting]
    ControlDTCSetting = 0x85,
    /// No codec. Usable through [crate::UdsClient::send_request]
    ResponseOnEvent = 0x86,
    /// See [link_control]
    LinkControl = 0x87,
}

impl Service {
    /// Request service id
    pub fn request_id(&self) -> u8 {
        *self as u8
    }

    /// Positive response service id
    pub fn response_id(&self) -> u8 {
        self.request_id() + 0x40
    }

    /// Service from its request id
    pub fn from_request_id(id: u8) -> Option<Self> {
        Self::from_repr(id)
    }

    /// Service from its positive response id
    pub fn from_response_id(id: u8) -> Option<Self> {
        id.checked_sub(0x40).and_then(Self::from_repr)
    }

    /// True if the second byte of the request is a subfunction, which can carry the
    /// suppress positive response bit
    pub fn use_subfunction(&self) -> bool {
        matches!(
            self,
            Self::DiagnosticSessionControl
                | Self::ECUReset
                | Self::ReadDTCInformation
                | Self::SecurityAccess
                | Self::CommunicationControl
                | Self::Authentication
                | Self::DynamicallyDefineDataIdentifier
                | Self::RoutineControl
                | Self::TesterPresent
                | Self::AccessTimingParameter
                | Self::ControlDTCSetting
                | Self::ResponseOnEvent
                | Self::LinkControl
        )
    }

    /// True if a positive response must carry data after the service id
    pub fn has_response_data(&self) -> bool {
        !matches!(
            self,
            Self::ClearDiagnosticInformation | Self::RequestTransferExit
        )
    }
}

/// UDS negative response codes
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::FromRepr,
    strum_macros::Display,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResponseCode {
    /// Not an error. Code carried by positive responses
    PositiveResponse = 0x00,
    /// ECU rejected the request (No specific error)
    GeneralReject = 0x10,
    /// Service is not supported by the ECU
    ServiceNotSupported = 0x11,
    /// Sub function is not supported by the ECU
    SubFunctionNotSupported = 0x12,
    /// Request message was an invalid length, or the format of the
    /// request was incorrect
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    /// The response message is too long for the transport protocol
    ResponseTooLong = 0x14,
    /// The ECU is too busy to perform this request. Therefore, the request
    /// Should be sent again if this error occurs
    BusyRepeatRequest = 0x21,
    /// The requested action could not be preformed due to the prerequisite conditions
    /// not being correct
    ConditionsNotCorrect = 0x22,
    /// The ECU cannot perform the request as the request has been sent in the incorrect order.
    /// For example, if a key is sent before a seed was requested
    RequestSequenceError = 0x24,
    /// The ECU cannot perform the request as it has timed out trying to communicate with another
    /// component within the vehicle.
    NoResponseFromSubnetComponent = 0x25,
    /// The ECU cannot perform the requested action as there is currently a DTC
    /// or failure of a component that is preventing the execution of the request.
    FailurePreventsExecutionOfRequestedAction = 0x26,
    /// The request message contains data outside of a valid range
    RequestOutOfRange = 0x31,
    /// The request could not be completed due to security access being denied.
    SecurityAccessDenied = 0x33,
    /// The client must authenticate before this request
    AuthenticationRequired = 0x34,
    /// The key sent to the ECU was invalid
    InvalidKey = 0x35,
    /// The client has tried to obtain security access to the ECU too many times with
    /// incorrect keys
    ExceedNumberOfAttempts = 0x36,
    /// The client has tried to request seed_key's too quickly, before the ECU timeout's period
    /// has expired
    RequiredTimeDelayNotExpired = 0x37,
    /// The request must be sent through SecuredDataTransmission
    SecureDataTransmissionRequired = 0x38,
    /// The request must not be sent through SecuredDataTransmission
    SecureDataTransmissionNotAllowed = 0x39,
    /// Verification of the secured data failed
    SecureDataVerificationFailed = 0x3A,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidTimePeriod = 0x50,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidSignature = 0x51,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidChainOfTrust = 0x52,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidType = 0x53,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidFormat = 0x54,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidContent = 0x55,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidScope = 0x56,
    #[allow(missing_docs)]
    CertificateVerificationFailedInvalidCertificate = 0x57,
    #[allow(missing_docs)]
    OwnershipVerificationFailed = 0x58,
    #[allow(missing_docs)]
    ChallengeCalculationFailed = 0x59,
    #[allow(missing_docs)]
    SettingAccessRightsFailed = 0x5A,
    #[allow(missing_docs)]
    SessionKeyCreationOrDerivationFailed = 0x5B,
    #[allow(missing_docs)]
    ConfigurationDataUsageFailed = 0x5C,
    #[allow(missing_docs)]
    DeAuthenticationFailed = 0x5D,
    /// The ECU cannot accept the requested upload/download request due to a fault condition
    UploadDownloadNotAccepted = 0x70,
    /// The ECU has halted data transfer due to a fault condition
    TransferDataSuspended = 0x71,
    /// The ECU has encountered an error during reprogramming (erasing / flashing)
    GeneralProgrammingFailure = 0x72,
    /// The ECU has detected the reprogramming error as the blockSequenceCounter is incorrect.
    WrongBlockSequenceCounter = 0x73,
    /// The ECU has accepted the request, but cannot reply right now. The client
    /// keeps waiting, using the P2* timeout
    RequestCorrectlyReceivedResponsePending = 0x78,
    /// The sub function is not supported in the current diagnostic session mode
    SubFunctionNotSupportedInActiveSession = 0x7E,
    /// The service is not supported in the current diagnostic session mode
    ServiceNotSupportedInActiveSession = 0x7F,
    /// Engine RPM is too high
    RpmTooHigh = 0x81,
    /// Engine RPM is too low
    RpmTooLow = 0x82,
    /// Engine is running
    EngineIsRunning = 0x83,
    /// Engine is not running
    EngineIsNotRunning = 0x84,
    /// Engine has not been running for long enough
    EngineRunTimeTooLow = 0x85,
    /// Engine temperature (coolant) is too high
    TemperatureTooHigh = 0x86,
    /// Engine temperature (coolant) is too low
    TemperatureTooLow = 0x87,
    /// Vehicle speed is too high
    VehicleSpeedTooHigh = 0x88,
    /// Vehicle speed is too low
    VehicleSpeedTooLow = 0x89,
    /// Throttle or pedal value is too high
    ThrottlePedalTooHigh = 0x8A,
    /// Throttle or pedal value is too low
    ThrottlePedalTooLow = 0x8B,
    /// Transmission is not in neutral
    TransmissionRangeNotInNeutral = 0x8C,
    /// Transmission is not in gear
    TransmissionRangeNotInGear = 0x8D,
    /// Brake is not applied
    BrakeSwitchNotClosed = 0x8F,
    /// Shifter lever is not in park
    ShifterLeverNotInPark = 0x90,
    /// Automatic/CVT transmission torque convert is locked
    TorqueConverterClutchLocked = 0x91,
    /// Voltage is too high
    VoltageTooHigh = 0x92,
    /// Voltage is too low
    VoltageTooLow = 0x93,
    /// A resource needed by the request is temporarily not available
    ResourceTemporarilyNotAvailable = 0x94,
}

/// A request to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    service: Service,
    subfunction: Option<u8>,
    suppress_positive_response: bool,
    data: Vec<u8>,
}

impl Request {
    /// Creates a request.
    ///
    /// ## Parameters
    /// * service - Service of the request
    /// * subfunction - Subfunction (0-0x7F). Required for services using one, forbidden otherwise
    /// * data - Data following the service id and subfunction
    pub fn new(service: Service, subfunction: Option<u8>, data: Vec<u8>) -> UdsResult<Self> {
        match (service.use_subfunction(), subfunction) {
            (true, None) => {
                return Err(UdsError::InvalidParameter(format!(
                    "Service {service} requires a subfunction"
                )));
            }
            (false, Some(_)) => {
                return Err(UdsError::InvalidParameter(format!(
                    "Service {service} does not use a subfunction"
                )));
            }
            (true, Some(s)) if s > 0x7F => {
                return Err(UdsError::InvalidParameter(format!(
                    "Subfunction must be an integer between 0 and 0x7F, got 0x{s:02X}"
                )));
            }
            _ => {}
        }
        Ok(Self {
            service,
            subfunction,
            suppress_positive_response: false,
            data,
        })
    }

    /// Sets the suppress positive response bit. Only valid for services using a subfunction
    pub fn with_suppress_positive_response(mut self, spr: bool) -> UdsResult<Self> {
        if spr && !self.service.use_subfunction() {
            return Err(UdsError::InvalidParameter(format!(
                "Cannot suppress positive response for service {} as it does not use a subfunction",
                self.service
            )));
        }
        self.suppress_positive_response = spr;
        Ok(self)
    }

    /// Service of the request
    pub fn service(&self) -> Service {
        self.service
    }

    /// Subfunction of the request, without the suppress positive response bit
    pub fn subfunction(&self) -> Option<u8> {
        self.subfunction
    }

    /// True if the server is asked not to send a positive response
    pub fn suppress_positive_response(&self) -> bool {
        self.suppress_positive_response
    }

    /// Data following the service id and subfunction
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the request data
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Encodes the request
    pub fn get_payload(&self) -> Vec<u8> {
        self.encode(self.suppress_positive_response)
    }

    /// Encodes the request, overriding the suppress positive response bit
    pub fn get_payload_with_spr(&self, spr: bool) -> UdsResult<Vec<u8>> {
        if spr && !self.service.use_subfunction() {
            return Err(UdsError::InvalidParameter(format!(
                "Cannot suppress positive response for service {} as it does not use a subfunction",
                self.service
            )));
        }
        Ok(self.encode(spr))
    }

    fn encode(&self, spr: bool) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.data.len() + 2);
        payload.push(self.service.request_id());
        if let Some(sub) = self.subfunction {
            payload.push(if spr { sub | 0x80 } else { sub });
        }
        payload.extend_from_slice(&self.data);
        payload
    }

    /// Decodes a request. Returns None if the payload is empty, the service is unknown,
    /// or the subfunction is missing
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let service = Service::from_request_id(*payload.first()?)?;
        if service.use_subfunction() {
            let sub = *payload.get(1)?;
            Some(Self {
                service,
                subfunction: Some(sub & 0x7F),
                suppress_positive_response: sub & 0x80 != 0,
                data: payload[2..].to_vec(),
            })
        } else {
            Some(Self {
                service,
                subfunction: None,
                suppress_positive_response: false,
                data: payload[1..].to_vec(),
            })
        }
    }
}

/// Typed data of a response, accessed with [Response::service_data]
pub trait ServiceData: Sized {
    /// Extracts this type from the response data union
    fn from_response_data(data: &ResponseData) -> Option<&Self>;
}

macro_rules! response_data {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Decoded data of a positive response, filled by a service's `interpret_response`
        #[derive(Debug, Clone, PartialEq)]
        #[allow(missing_docs)]
        pub enum ResponseData {
            $($variant($ty),)*
        }

        $(
            impl ServiceData for $ty {
                fn from_response_data(data: &ResponseData) -> Option<&Self> {
                    match data {
                        ResponseData::$variant(d) => Some(d),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for ResponseData {
                fn from(d: $ty) -> Self {
                    Self::$variant(d)
                }
            }
        )*
    };
}

response_data! {
    DiagnosticSessionControl(DiagnosticSessionControlData),
    EcuReset(EcuResetData),
    SecurityAccess(SecurityAccessData),
    CommunicationControl(CommunicationControlData),
    Authentication(AuthenticationData),
    TesterPresent(TesterPresentData),
    AccessTimingParameter(AccessTimingParameterData),
    ControlDtcSetting(ControlDtcSettingData),
    LinkControl(LinkControlData),
    ReadDataByIdentifier(ReadDataByIdentifierData),
    ReadMemoryByAddress(ReadMemoryByAddressData),
    ReadScalingData(ScalingData),
    DynamicallyDefineDid(DynamicallyDefineDidData),
    WriteDataByIdentifier(WriteDataByIdentifierData),
    WriteMemoryByAddress(WriteMemoryByAddressData),
    ReadDtcInformation(ReadDtcInformationData),
    IoControl(IoControlData),
    RoutineControl(RoutineControlData),
    TransferRequest(TransferRequestData),
    TransferData(BlockTransferData),
    RequestTransferExit(RequestTransferExitData),
    FileTransfer(FileTransferData),
}

/// A response from the server.
///
/// A response is never rejected while being parsed: a malformed payload gives a response
/// with [Response::valid] set to false, and the reason in [Response::invalid_reason]
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Service of the response. None if the service id is not known
    pub service: Option<Service>,
    /// Response code. 0 for a positive response, the NRC otherwise. See [ResponseCode]
    pub code: u8,
    /// Data following the service id (Positive) or the response code (Negative)
    pub data: Vec<u8>,
    /// False if the payload could not be parsed
    pub valid: bool,
    /// Why the response is invalid
    pub invalid_reason: String,
    /// True for a positive response
    pub positive: bool,
    /// Set by the client when the response does not match the request
    pub unexpected: bool,
    /// Typed data, filled once the response is interpreted
    pub service_data: Option<ResponseData>,
    /// Payload this response was parsed from
    pub original_payload: Vec<u8>,
}

impl Response {
    /// Creates a valid response. Used to emulate a server
    pub fn new(service: Service, code: u8, data: Vec<u8>) -> Self {
        Self {
            service: Some(service),
            code,
            data,
            valid: true,
            invalid_reason: String::new(),
            positive: code == ResponseCode::PositiveResponse as u8,
            unexpected: false,
            service_data: None,
            original_payload: Vec::new(),
        }
    }

    /// Creates a positive response
    pub fn positive(service: Service, data: Vec<u8>) -> Self {
        Self::new(service, ResponseCode::PositiveResponse as u8, data)
    }

    /// Creates a negative response
    pub fn negative(service: Service, code: ResponseCode) -> Self {
        Self::new(service, code as u8, Vec::new())
    }

    fn invalid(payload: &[u8], reason: &str) -> Self {
        Self {
            service: None,
            code: 0,
            data: Vec::new(),
            valid: false,
            invalid_reason: reason.to_string(),
            positive: false,
            unexpected: false,
            service_data: None,
            original_payload: payload.to_vec(),
        }
    }

    /// Parses a response payload
    pub fn from_payload(payload: &[u8]) -> Self {
        let Some(&first) = payload.first() else {
            return Self::invalid(payload, "Payload is empty");
        };
        if first != NEGATIVE_RESPONSE_ID {
            let Some(service) = Service::from_response_id(first) else {
                let mut res =
                    Self::invalid(payload, "Payload first byte is not a know service response ID.");
                res.data = payload[1..].to_vec();
                return res;
            };
            let mut res = Self::positive(service, payload[1..].to_vec());
            res.original_payload = payload.to_vec();
            if payload.len() < 2 && service.has_response_data() {
                res.valid = false;
                res.positive = false;
                res.invalid_reason =
                    "Payload must be at least 2 bytes long (service and response)".into();
            }
            res
        } else {
            let Some(&sid) = payload.get(1) else {
                return Self::invalid(payload, "Incomplete invalid response service (7Fxx)");
            };
            let Some(service) = Service::from_request_id(sid) else {
                return Self::invalid(payload, "Payload second byte is not a known service id.");
            };
            let Some(&code) = payload.get(2) else {
                let mut res = Self::invalid(payload, "Response code missing");
                res.service = Some(service);
                return res;
            };
            let mut res = Self::new(service, code, payload[3..].to_vec());
            res.positive = false;
            res.original_payload = payload.to_vec();
            res
        }
    }

    /// Encodes the response
    pub fn get_payload(&self) -> Vec<u8> {
        let Some(service) = self.service else {
            return self.original_payload.clone();
        };
        let mut payload = Vec::with_capacity(self.data.len() + 3);
        if self.positive {
            payload.push(service.response_id());
        } else {
            payload.extend_from_slice(&[NEGATIVE_RESPONSE_ID, service.request_id(), self.code]);
        }
        payload.extend_from_slice(&self.data);
        payload
    }

    /// Response code, if known
    pub fn response_code(&self) -> Option<ResponseCode> {
        ResponseCode::from_repr(self.code)
    }

    /// Typed data of the response, if interpreted as `T`
    pub fn service_data<T: ServiceData>(&self) -> Option<&T> {
        self.service_data.as_ref().and_then(T::from_response_data)
    }

    /// Name of the response service
    pub fn service_name(&self) -> String {
        self.service
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Unknown service".into())
    }

    /// Name of the response code
    pub fn code_name(&self) -> String {
        self.response_code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("Unknown code 0x{:02X}", self.code))
    }

    /// Returns true if this is a negative response asking to wait for the real response
    pub fn is_response_pending(&self) -> bool {
        self.valid
            && !self.positive
            && self.code == ResponseCode::RequestCorrectlyReceivedResponsePending as u8
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "<Invalid response: {}>", self.invalid_reason);
        }
        if self.positive {
            write!(
                f,
                "<PositiveResponse: [{}] - {} data bytes>",
                self.service_name(),
                self.data.len()
            )
        } else {
            write!(
                f,
                "<NegativeResponse: [{}] - {}>",
                self.service_name(),
                self.code_name()
            )
        }
    }
}

/// Formats bytes as hex for logging
pub(crate) fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
}

/// Fails if the standard version is older than `min`
pub(crate) fn require_version(
    version: StandardVersion,
    min: StandardVersion,
    what: &str,
) -> UdsResult<()> {
    if version < min {
        Err(UdsError::NotImplemented(format!(
            "{what} requires standard version {min} or later, but version {version} is in use"
        )))
    } else {
        Ok(())
    }
}

/// Checks `extra` is only zero padding, and that padding is tolerated
pub(crate) fn check_padding(
    response: &Response,
    extra: &[u8],
    tolerate_zero_padding: bool,
) -> UdsResult<()> {
    if extra.is_empty() || (tolerate_zero_padding && extra.iter().all(|b| *b == 0)) {
        Ok(())
    } else {
        Err(UdsError::invalid(
            response,
            "Response payload has extra data that has no meaning",
        ))
    }
}

/// Fails if the response is shorter than `len` bytes of data
pub(crate) fn require_len(response: &Response, len: usize, what: &str) -> UdsResult<()> {
    if response.data.len() < len {
        Err(UdsError::invalid(
            response,
            format!("Response data must be at least {len} bytes long ({what})"),
        ))
    } else {
        Ok(())
    }
}

/// Fails if the response does not echo the expected value
pub(crate) fn check_echo<T>(response: Response, name: &str, received: Option<T>, expected: T) -> UdsResult<Response>
where
    T: PartialEq + Copy + fmt::UpperHex,
{
    match received {
        Some(r) if r == expected => Ok(response),
        Some(r) => Err(UdsError::unexpected(
            response,
            format!("Server echoed {name} 0x{r:02X}, but request was for {name} 0x{expected:02X}"),
        )),
        None => Err(UdsError::unexpected(
            response,
            format!("Server response does not echo the {name}"),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_ids() {
        assert_eq!(Service::ECUReset.response_id(), 0x51);
        assert_eq!(Service::from_response_id(0xC3), Some(Service::AccessTimingParameter));
        assert_eq!(Service::from_response_id(0x3F), None);
        assert_eq!(Service::from_request_id(0x7F), None);
        assert!(Service::TesterPresent.use_subfunction());
        assert!(!Service::ReadDataByIdentifier.use_subfunction());
        assert!(!Service::ClearDiagnosticInformation.has_response_data());
    }

    #[test]
    fn service_names() {
        use std::str::FromStr;
        use strum::IntoEnumIterator;

        for s in Service::iter() {
            assert_eq!(Service::from_request_id(s.request_id()), Some(s));
            assert_eq!(Service::from_response_id(s.response_id()), Some(s));
            assert_eq!(Service::from_str(&s.to_string()).unwrap(), s);
        }
        assert!(Service::from_str("NotAService").is_err());
    }

    #[test]
    fn request_payload() {
        let req = Request::new(Service::TesterPresent, Some(0), vec![]).unwrap();
        assert_eq!(req.get_payload(), vec![0x3E, 0x00]);
        assert_eq!(req.get_payload_with_spr(true).unwrap(), vec![0x3E, 0x80]);
        let req = req.with_suppress_positive_response(true).unwrap();
        assert_eq!(req.get_payload(), vec![0x3E, 0x80]);

        let req = Request::new(Service::ReadDataByIdentifier, None, vec![0xF1, 0x90]).unwrap();
        assert_eq!(req.get_payload(), vec![0x22, 0xF1, 0x90]);
        assert!(req.get_payload_with_spr(true).is_err());
        assert!(req.clone().with_suppress_positive_response(true).is_err());

        assert!(Request::new(Service::TesterPresent, None, vec![]).is_err());
        assert!(Request::new(Service::TesterPresent, Some(0x80), vec![]).is_err());
        assert!(Request::new(Service::ReadDataByIdentifier, Some(1), vec![]).is_err());
    }

    #[test]
    fn request_from_payload() {
        let req = Request::from_payload(&[0x10, 0x83, 0xAA]).unwrap();
        assert_eq!(req.service(), Service::DiagnosticSessionControl);
        assert_eq!(req.subfunction(), Some(0x03));
        assert!(req.suppress_positive_response());
        assert_eq!(req.data(), &[0xAA]);
        assert!(Request::from_payload(&[]).is_none());
        assert!(Request::from_payload(&[0x10]).is_none());
        assert!(Request::from_payload(&[0x01, 0x02]).is_none());
    }

    #[test]
    fn positive_response() {
        let r = Response::from_payload(&[0x50, 0x01, 0x02]);
        assert!(r.valid);
        assert!(r.positive);
        assert_eq!(r.service, Some(Service::DiagnosticSessionControl));
        assert_eq!(r.data, vec![0x01, 0x02]);
        assert_eq!(r.get_payload(), vec![0x50, 0x01, 0x02]);

        let r = Response::from_payload(&[0x54]);
        assert!(r.valid);
        assert!(r.positive);

        let r = Response::from_payload(&[0x50]);
        assert!(!r.valid);
    }

    #[test]
    fn negative_response() {
        let r = Response::from_payload(&[0x7F, 0x22, 0x31]);
        assert!(r.valid);
        assert!(!r.positive);
        assert_eq!(r.service, Some(Service::ReadDataByIdentifier));
        assert_eq!(r.code, 0x31);
        assert_eq!(r.response_code(), Some(ResponseCode::RequestOutOfRange));
        assert_eq!(r.get_payload(), vec![0x7F, 0x22, 0x31]);

        let r = Response::from_payload(&[0x7F, 0x22, 0x78]);
        assert!(r.is_response_pending());

        let r = Response::from_payload(&[0x7F, 0x22, 0xEE]);
        assert!(r.valid);
        assert_eq!(r.code, 0xEE);
        assert!(r.code_name().contains("Unknown"));
    }

    #[test]
    fn invalid_responses() {
        for (payload, reason) in [
            (&[][..], "Payload is empty"),
            (&[0x01][..], "Payload first byte is not a know service response ID."),
            (&[0x7F][..], "Incomplete invalid response service (7Fxx)"),
            (&[0x7F, 0x01][..], "Payload second byte is not a known service id."),
            (&[0x7F, 0x22][..], "Response code missing"),
        ] {
            let r = Response::from_payload(payload);
            assert!(!r.valid);
            assert_eq!(r.invalid_reason, reason);
            assert_eq!(r.original_payload, payload.to_vec());
        }
    }
}
