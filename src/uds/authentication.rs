//! Provides methods for certificate and challenge based authentication (Standard version 2020)

use crate::{
    StandardVersion, UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, check_padding, require_len, require_version},
};

/// Authentication tasks
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AuthenticationTask {
    /// Leaves the authenticated state
    DeAuthenticate = 0x00,
    /// Client sends its certificate, server checks it
    VerifyCertificateUnidirectional = 0x01,
    /// Client and server exchange and check certificates
    VerifyCertificateBidirectional = 0x02,
    /// Client proves ownership of its certificate
    ProofOfOwnership = 0x03,
    /// Client sends a certificate for the server to evaluate
    TransmitCertificate = 0x04,
    /// Client requests a challenge (Symmetric or asymmetric APCE-less authentication)
    RequestChallengeForAuthentication = 0x05,
    /// Client proves ownership, server does not
    VerifyProofOfOwnershipUnidirectional = 0x06,
    /// Client and server prove ownership
    VerifyProofOfOwnershipBidirectional = 0x07,
    /// Reads the authentication configuration of the server
    AuthenticationConfiguration = 0x08,
}

impl From<AuthenticationTask> for u8 {
    fn from(t: AuthenticationTask) -> Self {
        t as u8
    }
}

/// Authentication return values
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AuthenticationReturnValue {
    /// Request accepted
    RequestAccepted = 0x00,
    /// General reject
    GeneralReject = 0x01,
    /// Authentication with certificate exchange (APCE)
    AuthenticationConfigurationApce = 0x02,
    /// Authentication with challenge response, asymmetric cryptography
    AuthenticationConfigurationAcrAsymmetric = 0x03,
    /// Authentication with challenge response, symmetric cryptography
    AuthenticationConfigurationAcrSymmetric = 0x04,
    /// Deauthentication succeeded
    DeAuthenticationSuccessful = 0x10,
    /// Certificate verified, ownership verification needed
    CertificateVerifiedOwnershipVerificationNecessary = 0x11,
    /// Ownership verified, authentication complete
    OwnershipVerifiedAuthenticationComplete = 0x12,
    /// Certificate verified
    CertificateVerified = 0x13,
}

/// Parameters of an Authentication request. Which ones are needed depends on the task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationParams {
    /// Communication configuration (Tasks 0x01, 0x02, 0x05)
    pub communication_configuration: Option<u8>,
    /// Client certificate (Tasks 0x01, 0x02)
    pub certificate_client: Option<Vec<u8>>,
    /// Client challenge (Tasks 0x01, 0x02, 0x06, 0x07). Empty when absent
    pub challenge_client: Option<Vec<u8>>,
    /// Client proof of ownership (Tasks 0x03, 0x06, 0x07)
    pub proof_of_ownership_client: Option<Vec<u8>>,
    /// Client ephemeral public key (Task 0x03). Empty when absent
    pub ephemeral_public_key_client: Option<Vec<u8>>,
    /// Certificate evaluation id (Task 0x04)
    pub certificate_evaluation_id: Option<u16>,
    /// Certificate data (Task 0x04)
    pub certificate_data: Option<Vec<u8>>,
    /// Algorithm indicator (Tasks 0x05, 0x06, 0x07)
    pub algorithm_indicator: Option<[u8; 16]>,
    /// Additional parameter (Tasks 0x06, 0x07). Empty when absent
    pub additional_parameter: Option<Vec<u8>>,
}

/// Decoded Authentication response. Fields not part of the task are None
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationData {
    /// Task echoed by the server
    pub authentication_task_echo: u8,
    /// Raw return value
    pub return_value: u8,
    /// Server challenge
    pub challenge_server: Option<Vec<u8>>,
    /// Server certificate
    pub certificate_server: Option<Vec<u8>>,
    /// Server proof of ownership
    pub proof_of_ownership_server: Option<Vec<u8>>,
    /// Server ephemeral public key
    pub ephemeral_public_key_server: Option<Vec<u8>>,
    /// Session key info
    pub session_key_info: Option<Vec<u8>>,
    /// Algorithm indicator
    pub algorithm_indicator: Option<Vec<u8>>,
    /// Additional parameter the server needs
    pub needed_additional_parameter: Option<Vec<u8>>,
}

impl AuthenticationData {
    /// Return value, None for vehicle manufacturer specific or reserved values
    pub fn return_value_kind(&self) -> Option<AuthenticationReturnValue> {
        AuthenticationReturnValue::from_repr(self.return_value)
    }
}

fn required<'a, T>(value: &'a Option<T>, name: &str, task: AuthenticationTask) -> UdsResult<&'a T> {
    value.as_ref().ok_or_else(|| {
        UdsError::InvalidParameter(format!("{name} is required for authentication task {task}"))
    })
}

fn push_len_prefixed(out: &mut Vec<u8>, field: Option<&Vec<u8>>, name: &str) -> UdsResult<()> {
    let field = field.map(Vec::as_slice).unwrap_or_default();
    let len = u16::try_from(field.len()).map_err(|_| {
        UdsError::InvalidParameter(format!("{name} cannot be longer than 0xFFFF bytes"))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(field);
    Ok(())
}

/// Builds an Authentication request
pub fn make_request(
    task: AuthenticationTask,
    params: &AuthenticationParams,
    version: StandardVersion,
) -> UdsResult<Request> {
    use AuthenticationTask as T;
    require_version(version, StandardVersion::V2020, "Authentication")?;
    let p = params;
    let mut data = Vec::new();
    match task {
        T::DeAuthenticate | T::AuthenticationConfiguration => {}
        T::VerifyCertificateUnidirectional | T::VerifyCertificateBidirectional => {
            data.push(*required(&p.communication_configuration, "communication_configuration", task)?);
            let cert = required(&p.certificate_client, "certificate_client", task)?;
            push_len_prefixed(&mut data, Some(cert), "certificate_client")?;
            push_len_prefixed(&mut data, p.challenge_client.as_ref(), "challenge_client")?;
        }
        T::ProofOfOwnership => {
            let pown = required(&p.proof_of_ownership_client, "proof_of_ownership_client", task)?;
            push_len_prefixed(&mut data, Some(pown), "proof_of_ownership_client")?;
            push_len_prefixed(
                &mut data,
                p.ephemeral_public_key_client.as_ref(),
                "ephemeral_public_key_client",
            )?;
        }
        T::TransmitCertificate => {
            let id = required(&p.certificate_evaluation_id, "certificate_evaluation_id", task)?;
            data.extend_from_slice(&id.to_be_bytes());
            let cert = required(&p.certificate_data, "certificate_data", task)?;
            if cert.is_empty() {
                return Err(UdsError::InvalidParameter("certificate_data cannot be empty".into()));
            }
            push_len_prefixed(&mut data, Some(cert), "certificate_data")?;
        }
        T::RequestChallengeForAuthentication => {
            data.push(*required(&p.communication_configuration, "communication_configuration", task)?);
            data.extend_from_slice(required(&p.algorithm_indicator, "algorithm_indicator", task)?);
        }
        T::VerifyProofOfOwnershipUnidirectional | T::VerifyProofOfOwnershipBidirectional => {
            data.extend_from_slice(required(&p.algorithm_indicator, "algorithm_indicator", task)?);
            let pown = required(&p.proof_of_ownership_client, "proof_of_ownership_client", task)?;
            push_len_prefixed(&mut data, Some(pown), "proof_of_ownership_client")?;
            push_len_prefixed(&mut data, p.challenge_client.as_ref(), "challenge_client")?;
            push_len_prefixed(&mut data, p.additional_parameter.as_ref(), "additional_parameter")?;
        }
    }
    Request::new(Service::Authentication, Some(task.into()), data)
}

/// Cursor over the variable part of an Authentication response
struct FieldReader<'a> {
    response: &'a Response,
    offset: usize,
}

impl FieldReader<'_> {
    fn fixed(&mut self, len: usize, name: &str) -> UdsResult<Vec<u8>> {
        let d = &self.response.data;
        if d.len() < self.offset + len {
            return Err(UdsError::invalid(
                self.response,
                format!("Response data is too short to contain the {name}"),
            ));
        }
        let out = d[self.offset..self.offset + len].to_vec();
        self.offset += len;
        Ok(out)
    }

    fn len_prefixed(&mut self, name: &str) -> UdsResult<Vec<u8>> {
        let len = self.fixed(2, &format!("length of the {name}"))?;
        self.fixed(u16::from_be_bytes([len[0], len[1]]) as usize, name)
    }
}

/// Decodes an Authentication response for the task that was requested
pub fn interpret_response(
    response: &mut Response,
    task: AuthenticationTask,
    tolerate_zero_padding: bool,
) -> UdsResult<()> {
    use AuthenticationTask as T;
    require_len(response, 2, "authentication task echo and return value")?;
    let mut out = AuthenticationData {
        authentication_task_echo: response.data[0],
        return_value: response.data[1],
        ..Default::default()
    };
    let mut r = FieldReader {
        response: &*response,
        offset: 2,
    };
    match task {
        T::DeAuthenticate | T::TransmitCertificate | T::AuthenticationConfiguration => {}
        T::VerifyCertificateUnidirectional => {
            out.challenge_server = Some(r.len_prefixed("server challenge")?);
            out.ephemeral_public_key_server = Some(r.len_prefixed("server ephemeral public key")?);
        }
        T::VerifyCertificateBidirectional => {
            out.challenge_server = Some(r.len_prefixed("server challenge")?);
            out.certificate_server = Some(r.len_prefixed("server certificate")?);
            out.proof_of_ownership_server = Some(r.len_prefixed("server proof of ownership")?);
            out.ephemeral_public_key_server = Some(r.len_prefixed("server ephemeral public key")?);
        }
        T::ProofOfOwnership => {
            out.session_key_info = Some(r.len_prefixed("session key info")?);
        }
        T::RequestChallengeForAuthentication => {
            out.algorithm_indicator = Some(r.fixed(16, "algorithm indicator")?);
            out.challenge_server = Some(r.len_prefixed("server challenge")?);
            out.needed_additional_parameter = Some(r.len_prefixed("needed additional parameter")?);
        }
        T::VerifyProofOfOwnershipUnidirectional => {
            out.algorithm_indicator = Some(r.fixed(16, "algorithm indicator")?);
            out.session_key_info = Some(r.len_prefixed("session key info")?);
        }
        T::VerifyProofOfOwnershipBidirectional => {
            out.algorithm_indicator = Some(r.fixed(16, "algorithm indicator")?);
            out.proof_of_ownership_server = Some(r.len_prefixed("server proof of ownership")?);
            out.session_key_info = Some(r.len_prefixed("session key info")?);
        }
    }
    let offset = r.offset;
    check_padding(response, &response.data[offset..], tolerate_zero_padding)?;
    response.service_data = Some(out.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Sends an Authentication request for any task
    pub fn authentication(
        &mut self,
        task: AuthenticationTask,
        params: &AuthenticationParams,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let version = client.config().standard_version;
            let tolerate = client.config().tolerate_zero_padding;
            let req = make_request(task, params, version)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response, task, tolerate)?;
            let echo = response
                .service_data::<AuthenticationData>()
                .map(|d| d.authentication_task_echo);
            check_echo(response, "authentication task", echo, u8::from(task)).map(Some)
        })
    }

    /// Leaves the authenticated state
    pub fn deauthenticate(&mut self) -> UdsResult<Option<Response>> {
        self.authentication(AuthenticationTask::DeAuthenticate, &AuthenticationParams::default())
    }

    /// Sends the client certificate for unidirectional verification
    pub fn verify_certificate_unidirectional(
        &mut self,
        communication_configuration: u8,
        certificate_client: &[u8],
        challenge_client: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            communication_configuration: Some(communication_configuration),
            certificate_client: Some(certificate_client.to_vec()),
            challenge_client: challenge_client.map(<[u8]>::to_vec),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::VerifyCertificateUnidirectional, &params)
    }

    /// Sends the client certificate for bidirectional verification
    pub fn verify_certificate_bidirectional(
        &mut self,
        communication_configuration: u8,
        certificate_client: &[u8],
        challenge_client: &[u8],
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            communication_configuration: Some(communication_configuration),
            certificate_client: Some(certificate_client.to_vec()),
            challenge_client: Some(challenge_client.to_vec()),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::VerifyCertificateBidirectional, &params)
    }

    /// Proves ownership of the client certificate
    pub fn proof_of_ownership(
        &mut self,
        proof_of_ownership_client: &[u8],
        ephemeral_public_key_client: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            proof_of_ownership_client: Some(proof_of_ownership_client.to_vec()),
            ephemeral_public_key_client: ephemeral_public_key_client.map(<[u8]>::to_vec),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::ProofOfOwnership, &params)
    }

    /// Transmits a certificate for the server to evaluate
    pub fn transmit_certificate(
        &mut self,
        certificate_evaluation_id: u16,
        certificate_data: &[u8],
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            certificate_evaluation_id: Some(certificate_evaluation_id),
            certificate_data: Some(certificate_data.to_vec()),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::TransmitCertificate, &params)
    }

    /// Requests a challenge from the server
    pub fn request_challenge_for_authentication(
        &mut self,
        communication_configuration: u8,
        algorithm_indicator: [u8; 16],
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            communication_configuration: Some(communication_configuration),
            algorithm_indicator: Some(algorithm_indicator),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::RequestChallengeForAuthentication, &params)
    }

    /// Sends the client proof of ownership, unidirectional
    pub fn verify_proof_of_ownership_unidirectional(
        &mut self,
        algorithm_indicator: [u8; 16],
        proof_of_ownership_client: &[u8],
        challenge_client: Option<&[u8]>,
        additional_parameter: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            algorithm_indicator: Some(algorithm_indicator),
            proof_of_ownership_client: Some(proof_of_ownership_client.to_vec()),
            challenge_client: challenge_client.map(<[u8]>::to_vec),
            additional_parameter: additional_parameter.map(<[u8]>::to_vec),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::VerifyProofOfOwnershipUnidirectional, &params)
    }

    /// Sends the client proof of ownership, bidirectional
    pub fn verify_proof_of_ownership_bidirectional(
        &mut self,
        algorithm_indicator: [u8; 16],
        proof_of_ownership_client: &[u8],
        challenge_client: &[u8],
        additional_parameter: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        let params = AuthenticationParams {
            algorithm_indicator: Some(algorithm_indicator),
            proof_of_ownership_client: Some(proof_of_ownership_client.to_vec()),
            challenge_client: Some(challenge_client.to_vec()),
            additional_parameter: additional_parameter.map(<[u8]>::to_vec),
            ..Default::default()
        };
        self.authentication(AuthenticationTask::VerifyProofOfOwnershipBidirectional, &params)
    }

    /// Reads the authentication configuration of the server
    pub fn authentication_configuration(&mut self) -> UdsResult<Option<Response>> {
        self.authentication(
            AuthenticationTask::AuthenticationConfiguration,
            &AuthenticationParams::default(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const V2020: StandardVersion = StandardVersion::V2020;

    #[test]
    fn deauthenticate() {
        assert_eq!(
            make_request(AuthenticationTask::DeAuthenticate, &AuthenticationParams::default(), V2020)
                .unwrap()
                .get_payload(),
            vec![0x29, 0x00]
        );
        let mut r = Response::from_payload(&[0x69, 0x00, 0x10]);
        interpret_response(&mut r, AuthenticationTask::DeAuthenticate, false).unwrap();
        let d = r.service_data::<AuthenticationData>().unwrap();
        assert_eq!(
            d.return_value_kind(),
            Some(AuthenticationReturnValue::DeAuthenticationSuccessful)
        );
        assert_eq!(d.challenge_server, None);
        assert_eq!(d.session_key_info, None);
        assert_eq!(d.algorithm_indicator, None);

        let mut r = Response::from_payload(&[0x69]);
        assert!(!r.valid);
        assert!(matches!(
            interpret_response(&mut r, AuthenticationTask::DeAuthenticate, false),
            Err(UdsError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn version_gate() {
        assert!(matches!(
            make_request(
                AuthenticationTask::DeAuthenticate,
                &AuthenticationParams::default(),
                StandardVersion::V2013
            ),
            Err(UdsError::NotImplemented(_))
        ));
    }

    #[test]
    fn verify_certificate() {
        let params = AuthenticationParams {
            communication_configuration: Some(0x01),
            certificate_client: Some(vec![0xAA, 0xBB]),
            challenge_client: None,
            ..Default::default()
        };
        assert_eq!(
            make_request(AuthenticationTask::VerifyCertificateUnidirectional, &params, V2020)
                .unwrap()
                .get_payload(),
            vec![0x29, 0x01, 0x01, 0x00, 0x02, 0xAA, 0xBB, 0x00, 0x00]
        );
        assert!(
            make_request(
                AuthenticationTask::VerifyCertificateUnidirectional,
                &AuthenticationParams::default(),
                V2020
            )
            .is_err()
        );

        let mut r = Response::from_payload(&[
            0x69, 0x01, 0x11, 0x00, 0x02, 0x12, 0x34, 0x00, 0x01, 0x56,
        ]);
        interpret_response(&mut r, AuthenticationTask::VerifyCertificateUnidirectional, false).unwrap();
        let d = r.service_data::<AuthenticationData>().unwrap();
        assert_eq!(d.challenge_server, Some(vec![0x12, 0x34]));
        assert_eq!(d.ephemeral_public_key_server, Some(vec![0x56]));
        assert_eq!(d.certificate_server, None);

        let mut r = Response::from_payload(&[0x69, 0x01, 0x11, 0x00, 0x02, 0x12]);
        assert!(interpret_response(&mut r, AuthenticationTask::VerifyCertificateUnidirectional, false).is_err());
    }

    #[test]
    fn challenge() {
        let algo = [0x06u8; 16];
        let params = AuthenticationParams {
            communication_configuration: Some(0x00),
            algorithm_indicator: Some(algo),
            ..Default::default()
        };
        let mut expected = vec![0x29, 0x05, 0x00];
        expected.extend_from_slice(&algo);
        assert_eq!(
            make_request(AuthenticationTask::RequestChallengeForAuthentication, &params, V2020)
                .unwrap()
                .get_payload(),
            expected
        );

        let mut payload = vec![0x69, 0x05, 0x00];
        payload.extend_from_slice(&algo);
        payload.extend_from_slice(&[0x00, 0x01, 0x99, 0x00, 0x00, 0x00]);
        let mut r = Response::from_payload(&payload);
        interpret_response(&mut r, AuthenticationTask::RequestChallengeForAuthentication, true).unwrap();
        let d = r.service_data::<AuthenticationData>().unwrap();
        assert_eq!(d.algorithm_indicator, Some(algo.to_vec()));
        assert_eq!(d.challenge_server, Some(vec![0x99]));
        assert_eq!(d.needed_additional_parameter, Some(vec![]));

        let mut r = Response::from_payload(&payload);
        assert!(interpret_response(&mut r, AuthenticationTask::RequestChallengeForAuthentication, false).is_err());
    }
}
