//! Provides methods for security seed/key access to the ECU in order to unlock functions which
//! are considered secure such as writing or reading to specific memory regions on the ECU

use log::info;

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Security operation request
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
pub enum SecurityAccessType {
    /// Asks the ECU for a security seed. Uses odd subfunctions
    RequestSeed,
    /// Sends the computed key to the ECU. Uses even subfunctions
    SendKey,
}

/// Decoded SecurityAccess response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityAccessData {
    /// Security level echoed by the server
    pub security_level_echo: u8,
    /// Seed, for a [SecurityAccessType::RequestSeed] response
    pub seed: Option<Vec<u8>>,
}

/// Returns the subfunction to use for a security level.
///
/// Seeds are requested with odd levels, and keys sent with the following even level.
/// Any level of the pair can be given
pub fn normalize_level(level: u8, access_type: SecurityAccessType) -> UdsResult<u8> {
    if !(1..=0x7E).contains(&level) {
        return Err(UdsError::InvalidParameter(format!(
            "Security level must be an integer between 1 and 0x7E, got 0x{level:02X}"
        )));
    }
    Ok(match access_type {
        SecurityAccessType::RequestSeed if level % 2 == 0 => level - 1,
        SecurityAccessType::SendKey if level % 2 == 1 => level + 1,
        _ => level,
    })
}

/// Builds a SecurityAccess request.
///
/// ## Parameters
/// * level - Security level
/// * access_type - Seed request or key
/// * data - Key for [SecurityAccessType::SendKey] (Required). Optional
///   securityAccessDataRecord for [SecurityAccessType::RequestSeed]
pub fn make_request(level: u8, access_type: SecurityAccessType, data: Option<&[u8]>) -> UdsResult<Request> {
    let sub = normalize_level(level, access_type)?;
    if access_type == SecurityAccessType::SendKey && data.is_none() {
        return Err(UdsError::InvalidParameter(
            "A key must be given when sending a key".into(),
        ));
    }
    Request::new(
        Service::SecurityAccess,
        Some(sub),
        data.map(|d| d.to_vec()).unwrap_or_default(),
    )
}

/// Decodes a SecurityAccess response
pub fn interpret_response(response: &mut Response, access_type: SecurityAccessType) -> UdsResult<()> {
    require_len(response, 1, "security level echo")?;
    let mut res = SecurityAccessData {
        security_level_echo: response.data[0],
        seed: None,
    };
    if access_type == SecurityAccessType::RequestSeed {
        if response.data.len() < 2 {
            return Err(UdsError::invalid(
                response,
                "Response data must be at least 2 bytes long to contain a seed",
            ));
        }
        res.seed = Some(response.data[1..].to_vec());
    }
    response.service_data = Some(res.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    fn security_access(
        &mut self,
        level: u8,
        access_type: SecurityAccessType,
        data: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(level, access_type, data)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response, access_type)?;
            let echo = response
                .service_data::<SecurityAccessData>()
                .map(|d| d.security_level_echo);
            let expected = normalize_level(level, access_type)?;
            check_echo(response, "security level", echo, expected).map(Some)
        })
    }

    /// Requests a seed from the ECU.
    ///
    /// ## Parameters
    /// * level - Security level. The odd subfunction of the level pair is used
    /// * data - Optional securityAccessDataRecord
    pub fn request_seed(&mut self, level: u8, data: Option<&[u8]>) -> UdsResult<Option<Response>> {
        self.security_access(level, SecurityAccessType::RequestSeed, data)
    }

    /// Sends the computed key to the ECU.
    ///
    /// ## Parameters
    /// * level - Security level. The even subfunction of the level pair is used
    /// * key - The computed key
    pub fn send_key(&mut self, level: u8, key: &[u8]) -> UdsResult<Option<Response>> {
        self.security_access(level, SecurityAccessType::SendKey, Some(key))
    }

    /// Unlocks a security level: requests a seed, computes the key with
    /// [crate::ClientConfig::security_algo], and sends it.
    ///
    /// A seed made of zeros means the level is already unlocked. The seed response is then
    /// returned, and no key is sent
    ///
    /// ## Parameters
    /// * level - Security level
    /// * seed_params - Optional securityAccessDataRecord sent with the seed request
    pub fn unlock_security_access(
        &mut self,
        level: u8,
        seed_params: Option<&[u8]>,
    ) -> UdsResult<Option<Response>> {
        let Some(seed_response) = self.request_seed(level, seed_params)? else {
            return Ok(None);
        };
        let Some(seed) = seed_response
            .service_data::<SecurityAccessData>()
            .and_then(|d| d.seed.clone())
        else {
            // Negative or invalid response returned by the error policy
            return Ok(Some(seed_response));
        };
        if seed.iter().all(|b| *b == 0) {
            info!("Security access level 0x{level:02X} is already unlocked, no key will be sent");
            return Ok(Some(seed_response));
        }
        let algo = self.config().security_algo.clone().ok_or_else(|| {
            UdsError::config(None, "Client configuration does not provide a security algorithm")
        })?;
        let seed_level = normalize_level(level, SecurityAccessType::RequestSeed)?;
        let key = algo.compute(
            seed_level,
            &seed,
            self.config().security_algo_params.as_deref(),
        );
        self.send_key(level, &key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_normalization() {
        assert_eq!(normalize_level(1, SecurityAccessType::RequestSeed).unwrap(), 1);
        assert_eq!(normalize_level(2, SecurityAccessType::RequestSeed).unwrap(), 1);
        assert_eq!(normalize_level(1, SecurityAccessType::SendKey).unwrap(), 2);
        assert_eq!(normalize_level(2, SecurityAccessType::SendKey).unwrap(), 2);
        assert!(normalize_level(0, SecurityAccessType::SendKey).is_err());
        assert!(normalize_level(0x7F, SecurityAccessType::SendKey).is_err());
    }

    #[test]
    fn request() {
        assert_eq!(
            make_request(0x11, SecurityAccessType::RequestSeed, None).unwrap().get_payload(),
            vec![0x27, 0x11]
        );
        assert_eq!(
            make_request(0x11, SecurityAccessType::SendKey, Some(&[0x12, 0x34]))
                .unwrap()
                .get_payload(),
            vec![0x27, 0x12, 0x12, 0x34]
        );
        assert!(make_request(0x11, SecurityAccessType::SendKey, None).is_err());
    }

    #[test]
    fn seed_response() {
        let mut r = Response::from_payload(&[0x67, 0x01, 0x11, 0x22, 0x33]);
        interpret_response(&mut r, SecurityAccessType::RequestSeed).unwrap();
        let d = r.service_data::<SecurityAccessData>().unwrap();
        assert_eq!(d.security_level_echo, 1);
        assert_eq!(d.seed, Some(vec![0x11, 0x22, 0x33]));

        let mut r = Response::from_payload(&[0x67, 0x01]);
        assert!(interpret_response(&mut r, SecurityAccessType::RequestSeed).is_err());

        let mut r = Response::from_payload(&[0x67, 0x02]);
        interpret_response(&mut r, SecurityAccessType::SendKey).unwrap();
        assert_eq!(r.service_data::<SecurityAccessData>().unwrap().seed, None);
    }
}
