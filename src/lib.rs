#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_numeric_casts,
    //unstable_features,
    //unused_imports,
    unused_import_braces,
    unused_qualifications,
    clippy::uninlined_format_args
)]

//! A crate which implements the client side of Unified Diagnostic Services (UDS - ISO14229),
//! as well as the transport plumbing needed to talk to an ECU over ISO-TP
//!
//! ## Unified diagnostic services (UDS)
//! ISO14229 - UDS is an advanced diagnostic protocol utilized by almost all vehicle manufacturers from 2006 onwards.
//! This protocol allows for reading/writing directly to the ECU, and should therefore be used with caution.
//!
//! Revisions 2006, 2013 and 2020 of the standard are supported. Some services change their
//! encoding between revisions, so the revision in use must be set in [config::ClientConfig::standard_version].
//!
//! The crate is split into:
//! * [uds] - The request/response envelope, and one codec module per UDS service. Each codec
//!   is a pair of pure functions (`make_request` / `interpret_response`) working on bytes only.
//! * [client::UdsClient] - Drives a [channel::Connection], handles P2/P2* timing and response pending
//!   messages, and applies the negative / invalid / unexpected response policy of [config::ClientConfig]
//! * [did] - Data identifier codecs, consumed by the services which read or write DIDs
//!
//! ## Hardware support
//!
//! Transports only need to implement [channel::Connection]. The following are provided:
//!
//! ### SocketCAN (Linux only)
//! Kernel ISO-TP sockets, behind the `socketcan` feature
//!
//! ### Software ISO-TP
//! [hardware::isotp::IsoTpConnection] performs ISO-TP segmentation on top of any raw [channel::CanChannel]
//!
//! ### Queue / Simulation
//! In-process transports, useful for testing a client without any hardware attached
//!

use channel::ChannelError;
use uds::Response;

pub mod channel;
pub mod client;
pub mod communication;
pub mod config;
pub mod did;
pub mod dtc;
pub mod dynamic_did;
pub mod hardware;
pub mod memory;
pub mod uds;

pub use client::UdsClient;
pub use config::{ClientConfig, StandardVersion};

/// UDS client result
pub type UdsResult<T> = Result<T, UdsError>;

/// Which timeout tier expired while waiting for a response
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
pub enum TimeoutKind {
    /// The server did not respond within P2
    P2,
    /// The server sent a response pending message, but did not follow up within P2*
    #[strum(serialize = "P2*")]
    P2Star,
    /// The overall request timeout expired
    Overall,
}

#[derive(Debug, thiserror::Error)]
/// UDS client error
pub enum UdsError {
    /// A parameter given to the function is invalid. Check the function's documentation
    /// for more information
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// The client configuration is missing something the request needs
    #[error("Configuration error: {msg}")]
    Config {
        /// Data identifier the error relates to, if any
        key: Option<u16>,
        /// Error description
        msg: String,
    },
    /// Feature is not available with the selected standard version, or not supported by this crate
    #[error("Not implemented: '{0}'")]
    NotImplemented(String),
    /// No response was received in time
    #[error("Did not receive response in time. {kind} timeout time has expired (timeout={:.3} sec)", timeout.as_secs_f32())]
    Timeout {
        /// Timeout tier that expired
        kind: TimeoutKind,
        /// The timeout value that was used for the last wait
        timeout: std::time::Duration,
        /// Last response received during the exchange, if any (Usually a response pending)
        last_response: Option<Box<Response>>,
    },
    /// The ECU rejected the request
    #[error("ECU negative response to {}. Code 0x{:02X} ({})", .0.service_name(), .0.code, .0.code_name())]
    NegativeResponse(Box<Response>),
    /// The ECU response is malformed, or too short to be decoded
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// The offending response
        response: Box<Response>,
        /// Why the response is invalid
        reason: String,
    },
    /// The ECU response is well formed, but does not match what was requested
    #[error("Unexpected response: {reason}")]
    UnexpectedResponse {
        /// The offending response
        response: Box<Response>,
        /// Why the response is unexpected
        reason: String,
    },
    /// Error with underlying communication channel
    #[error("Communication channel error")]
    Channel(
        #[from]
        #[source]
        ChannelError,
    ),
}

impl UdsError {
    pub(crate) fn invalid(response: &Response, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            response: Box::new(response.clone()),
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected(response: Response, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            response: Box::new(response),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(key: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Config {
            key,
            msg: msg.into(),
        }
    }

    /// Returns the response attached to this error, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::NegativeResponse(r) => Some(r),
            Self::InvalidResponse { response, .. } | Self::UnexpectedResponse { response, .. } => {
                Some(response)
            }
            Self::Timeout { last_response, .. } => last_response.as_deref(),
            _ => None,
        }
    }
}

/// Reads a big endian unsigned integer `width` bytes wide from the start of `input`.
///
/// Widths above 8 bytes cannot be represented and return [UdsError::NotImplemented]
pub fn read_be_uint(input: &[u8], width: usize) -> UdsResult<u64> {
    if width > 8 {
        return Err(UdsError::NotImplemented(format!(
            "This client does not support number bigger than 64 bits, but got {} bits",
            width * 8
        )));
    }
    if input.len() < width {
        return Err(UdsError::InvalidParameter(format!(
            "Cannot read a {width} byte integer from {} bytes",
            input.len()
        )));
    }
    Ok(input[..width]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Writes `value` as a big endian unsigned integer `width` bytes wide.
/// Bytes past 8 are zero filled
pub fn write_be_uint(value: u64, width: usize) -> Vec<u8> {
    let mut res = vec![0; width];
    for (i, b) in res.iter_mut().rev().enumerate().take(8) {
        *b = (value >> (i * 8)) as u8;
    }
    res
}

/// Returns the minimum number of bytes needed to hold `value` (At least 1)
pub fn min_byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    std::cmp::max(1, bits.div_ceil(8))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn be_uint() {
        assert_eq!(read_be_uint(&[0x12, 0x34, 0x56], 3).unwrap(), 0x123456);
        assert_eq!(read_be_uint(&[0x12, 0x34, 0x56], 1).unwrap(), 0x12);
        assert_eq!(read_be_uint(&[], 0).unwrap(), 0);
        assert!(matches!(
            read_be_uint(&[0; 9], 9),
            Err(UdsError::NotImplemented(_))
        ));
        assert!(matches!(
            read_be_uint(&[0; 2], 3),
            Err(UdsError::InvalidParameter(_))
        ));
        assert_eq!(write_be_uint(0x1234, 3), vec![0x00, 0x12, 0x34]);
        assert_eq!(write_be_uint(0x1234, 1), vec![0x34]);
    }

    #[test]
    fn byte_width() {
        assert_eq!(min_byte_width(0), 1);
        assert_eq!(min_byte_width(0xFF), 1);
        assert_eq!(min_byte_width(0x100), 2);
        assert_eq!(min_byte_width(u64::MAX), 8);
    }
}
