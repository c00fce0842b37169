//! Client configuration

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use crate::{
    UdsError, UdsResult,
    did::{DidConfig, IoConfig},
    memory::check_format,
};

/// Revision of ISO14229 used by the server.
///
/// Some services change their encoding between revisions, and the bytes alone
/// cannot tell which revision is in use
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StandardVersion {
    /// ISO14229-1:2006
    #[strum(serialize = "2006")]
    V2006,
    /// ISO14229-1:2013
    #[strum(serialize = "2013")]
    V2013,
    /// ISO14229-1:2020
    #[strum(serialize = "2020")]
    V2020,
}

/// Seed to key function used by [crate::UdsClient::unlock_security_access].
///
/// Arguments are the security level (As sent in the RequestSeed request), the seed,
/// and the user parameters from [ClientConfig::security_algo_params]
#[derive(Clone)]
pub struct SecurityAlgorithm(Arc<dyn Fn(u8, &[u8], Option<&[u8]>) -> Vec<u8> + Send + Sync>);

impl SecurityAlgorithm {
    /// Wraps a seed to key function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u8, &[u8], Option<&[u8]>) -> Vec<u8> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Computes the key for a seed
    pub fn compute(&self, level: u8, seed: &[u8], params: Option<&[u8]>) -> Vec<u8> {
        (self.0)(level, seed, params)
    }
}

impl fmt::Debug for SecurityAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityAlgorithm(..)")
    }
}

/// Size of DTC extended data records, needed to decode them
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtendedDataSize {
    /// Every DTC uses the same record size
    Fixed(usize),
    /// Record size per DTC id
    PerDtc(HashMap<u32, usize>),
}

impl ExtendedDataSize {
    /// Record size for a DTC
    pub fn get(&self, dtc: u32) -> Option<usize> {
        match self {
            Self::Fixed(s) => Some(*s),
            Self::PerDtc(map) => map.get(&dtc).copied(),
        }
    }
}

/// Configuration of a [crate::UdsClient]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Return an error when the server sends a negative response.
    /// If false, the response is returned to the caller
    pub exception_on_negative_response: bool,
    /// Return an error when the server response is malformed.
    /// If false, the response is returned with [crate::uds::Response::valid] set to false
    pub exception_on_invalid_response: bool,
    /// Return an error when the server response does not match the request.
    /// If false, the response is returned with [crate::uds::Response::unexpected] set to true
    pub exception_on_unexpected_response: bool,
    /// Accept trailing zero bytes after a response, as added by transports padding to a fixed frame size
    pub tolerate_zero_padding: bool,
    /// Drop DTC records made only of zeros
    pub ignore_all_zero_dtc: bool,
    /// Number of bytes of a DID inside DTC snapshot records. Not standardized
    pub dtc_snapshot_did_size: usize,
    /// Address format (In bits) the server expects, used when a [crate::memory::MemoryLocation] has none
    pub server_address_format: Option<u8>,
    /// Memory size format (In bits) the server expects, used when a [crate::memory::MemoryLocation] has none
    pub server_memorysize_format: Option<u8>,
    /// Data identifier codecs
    pub data_identifiers: DidConfig,
    /// InputOutputControlByIdentifier codecs and masks
    pub input_output: IoConfig,
    /// Maximum time for a request to complete, including response pending extensions.
    /// If None, only P2/P2* bound the exchange
    pub request_timeout: Option<Duration>,
    /// Time the server has to respond
    pub p2_timeout: Duration,
    /// Time the server has to respond after a response pending message
    pub p2_star_timeout: Duration,
    /// Standard revision implemented by the server
    pub standard_version: StandardVersion,
    /// Replace P2 and P2* with the values the server returns in DiagnosticSessionControl
    pub use_server_timing: bool,
    /// Seed to key algorithm
    pub security_algo: Option<SecurityAlgorithm>,
    /// Parameters passed to the seed to key algorithm
    pub security_algo_params: Option<Vec<u8>>,
    /// DTC extended data record size
    pub extended_data_size: Option<ExtendedDataSize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            exception_on_negative_response: true,
            exception_on_invalid_response: true,
            exception_on_unexpected_response: true,
            tolerate_zero_padding: true,
            ignore_all_zero_dtc: true,
            dtc_snapshot_did_size: 2,
            server_address_format: None,
            server_memorysize_format: None,
            data_identifiers: DidConfig::default(),
            input_output: IoConfig::default(),
            request_timeout: Some(Duration::from_secs(5)),
            p2_timeout: Duration::from_secs(1),
            p2_star_timeout: Duration::from_secs(5),
            standard_version: StandardVersion::V2020,
            use_server_timing: true,
            security_algo: None,
            security_algo_params: None,
            extended_data_size: None,
        }
    }
}

impl ClientConfig {
    /// Checks the configuration is usable
    pub fn validate(&self) -> UdsResult<()> {
        if let Some(fmt) = self.server_address_format {
            check_format(fmt, "server_address_format")?;
        }
        if let Some(fmt) = self.server_memorysize_format {
            check_format(fmt, "server_memorysize_format")?;
        }
        if self.dtc_snapshot_did_size == 0 {
            return Err(UdsError::InvalidParameter(
                "dtc_snapshot_did_size must be greater than 0".into(),
            ));
        }
        if self.p2_timeout.is_zero() {
            return Err(UdsError::InvalidParameter(
                "p2_timeout must be greater than 0".into(),
            ));
        }
        if self.p2_star_timeout.is_zero() {
            return Err(UdsError::InvalidParameter(
                "p2_star_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ClientConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(cfg.standard_version, StandardVersion::V2020);
        assert!(StandardVersion::V2013 > StandardVersion::V2006);
        assert_eq!(StandardVersion::V2013.to_string(), "2013");
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = ClientConfig {
            server_address_format: Some(12),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ClientConfig {
            dtc_snapshot_did_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ClientConfig {
            p2_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn security_algorithm() {
        let algo = SecurityAlgorithm::new(|level, seed, params| {
            let mut key: Vec<u8> = seed.iter().map(|b| b ^ level).collect();
            if let Some(p) = params {
                key.extend_from_slice(p);
            }
            key
        });
        assert_eq!(algo.compute(0x01, &[0x10, 0x11], Some(&[0xAA])), vec![0x11, 0x10, 0xAA]);
    }

    #[test]
    fn extended_data_size() {
        assert_eq!(ExtendedDataSize::Fixed(4).get(0x123456), Some(4));
        let per = ExtendedDataSize::PerDtc(HashMap::from([(0x123456, 2)]));
        assert_eq!(per.get(0x123456), Some(2));
        assert_eq!(per.get(0x123457), None);
    }
}
