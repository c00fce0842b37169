//! UDS client
//!
//! The [UdsClient] drives a [Connection]: it sends requests, waits for responses while
//! honouring the P2 / P2* timing of the server, and applies the error policy of
//! [ClientConfig] to every service call.

use std::{
    ops::{Deref, DerefMut},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{
    ClientConfig, TimeoutKind, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, hex},
};

/// Timing values returned by the server in DiagnosticSessionControl
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SessionTiming {
    /// Server P2 max
    pub p2_server_max: Option<Duration>,
    /// Server P2* max
    pub p2_star_server_max: Option<Duration>,
}

#[derive(Debug, Copy, Clone)]
struct SuppressState {
    wait_nrc: bool,
}

/// UDS client
#[derive(Debug)]
pub struct UdsClient<C: Connection> {
    conn: C,
    config: ClientConfig,
    session_timing: SessionTiming,
    suppress: Option<SuppressState>,
    last_response: Option<Response>,
}

impl<C: Connection> UdsClient<C> {
    /// Creates a client. The connection is not opened
    pub fn new(conn: C, config: ClientConfig) -> UdsResult<Self> {
        config.validate()?;
        Ok(Self {
            conn,
            config,
            session_timing: SessionTiming::default(),
            suppress: None,
            last_response: None,
        })
    }

    /// Opens the underlying connection
    pub fn open(&mut self) -> UdsResult<()> {
        self.conn.open()?;
        Ok(())
    }

    /// Closes the underlying connection
    pub fn close(&mut self) -> UdsResult<()> {
        self.conn.close()?;
        Ok(())
    }

    /// Returns true if the underlying connection is open
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Modifies the configuration. The change is rejected if the result is not valid
    pub fn with_config<F: FnOnce(&mut ClientConfig)>(&mut self, f: F) -> UdsResult<()> {
        let mut cfg = self.config.clone();
        f(&mut cfg);
        cfg.validate()?;
        self.config = cfg;
        Ok(())
    }

    /// Underlying connection
    pub fn conn(&self) -> &C {
        &self.conn
    }

    /// Underlying connection
    pub fn conn_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Returns the underlying connection
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Last response received from the server, including response pending messages
    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Timing values last returned by the server
    pub fn session_timing(&self) -> SessionTiming {
        self.session_timing
    }

    pub(crate) fn set_session_timing(&mut self, timing: SessionTiming) {
        self.session_timing = timing;
    }

    /// P2 timeout in use
    pub fn p2_timeout(&self) -> Duration {
        match self.session_timing.p2_server_max {
            Some(t) if self.config.use_server_timing => t,
            _ => self.config.p2_timeout,
        }
    }

    /// P2* timeout in use
    pub fn p2_star_timeout(&self) -> Duration {
        match self.session_timing.p2_star_server_max {
            Some(t) if self.config.use_server_timing => t,
            _ => self.config.p2_star_timeout,
        }
    }

    /// Suppresses positive responses while the returned guard lives.
    ///
    /// Requests of services with a subfunction are sent with the suppress positive response
    /// bit set, and return `None`.
    ///
    /// ## Parameters
    /// * wait_nrc - Wait up to P2 for a negative response. A positive response is then
    ///   reported as an unexpected response
    pub fn suppress_positive_response(&mut self, wait_nrc: bool) -> SuppressPositiveResponse<'_, C> {
        self.suppress = Some(SuppressState { wait_nrc });
        SuppressPositiveResponse { client: self }
    }

    /// Sends a request, and waits for the response using the configured request timeout.
    ///
    /// ## Returns
    /// `None` if the positive response was suppressed, otherwise the positive response.
    /// Negative, invalid and unexpected responses are returned as errors. The error policy of
    /// [ClientConfig] is not applied here
    pub fn send_request(&mut self, request: &Request) -> UdsResult<Option<Response>> {
        let timeout = self.config.request_timeout;
        self.exchange(request, timeout, None)
    }

    /// Like [UdsClient::send_request], with an explicit overall timeout.
    /// A `None` timeout waits through any number of response pending messages
    pub fn send_request_with_timeout(
        &mut self,
        request: &Request,
        timeout: Option<Duration>,
    ) -> UdsResult<Option<Response>> {
        self.exchange(request, timeout, None)
    }

    /// Sends a request, and returns every response received until the final one,
    /// response pending messages included. A final negative response ends the list
    /// instead of being returned as an error
    pub fn send_request_all(&mut self, request: &Request) -> UdsResult<Vec<Response>> {
        let mut responses = Vec::new();
        let timeout = self.config.request_timeout;
        match self.exchange(request, timeout, Some(&mut responses)) {
            Ok(_) | Err(UdsError::NegativeResponse(_)) => Ok(responses),
            Err(e) => Err(e),
        }
    }

    fn exchange(
        &mut self,
        request: &Request,
        overall_timeout: Option<Duration>,
        mut collect: Option<&mut Vec<Response>>,
    ) -> UdsResult<Option<Response>> {
        let service = request.service();
        let mut spr = request.suppress_positive_response();
        let mut wait_nrc = false;
        if let Some(state) = self.suppress {
            if service.use_subfunction() {
                spr = true;
                wait_nrc = state.wait_nrc;
            } else {
                warn!(
                    "Suppress positive response was requested for service {service}, which has no subfunction. Request will be sent normally"
                );
            }
        }
        let payload = request.get_payload_with_spr(spr)?;

        let start = Instant::now();
        let deadline = overall_timeout.map(|t| start + t);
        let mut single_timeout = self.p2_timeout();
        let mut using_p2_star = false;
        let mut last_pending: Option<Response> = None;

        self.conn.empty_rxqueue()?;
        debug!("Sending request to server: {}", hex(&payload));
        self.conn.send(&payload)?;

        if spr && !wait_nrc {
            debug!("Suppress positive response bit set. Not waiting for a response");
            return Ok(None);
        }

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let wait = match remaining {
                Some(r) => std::cmp::min(single_timeout, r),
                None => single_timeout,
            };
            let frame = if wait.is_zero() {
                None
            } else {
                self.conn.wait_frame(Some(wait))?
            };
            let Some(frame) = frame else {
                if wait_nrc {
                    debug!("No negative response received while positive response is suppressed");
                    return Ok(None);
                }
                let kind = match remaining {
                    Some(r) if single_timeout >= r => TimeoutKind::Overall,
                    _ if using_p2_star => TimeoutKind::P2Star,
                    _ => TimeoutKind::P2,
                };
                let timeout = match kind {
                    TimeoutKind::Overall => overall_timeout.unwrap_or(wait),
                    _ => single_timeout,
                };
                error!(
                    "Did not receive response in time. {kind} timeout time has expired (timeout={:.3} sec)",
                    timeout.as_secs_f32()
                );
                return Err(UdsError::Timeout {
                    kind,
                    timeout,
                    last_response: last_pending.map(Box::new),
                });
            };

            debug!("Received response from server: {}", hex(&frame));
            let response = Response::from_payload(&frame);
            self.last_response = Some(response.clone());
            if let Some(list) = collect.as_deref_mut() {
                list.push(response.clone());
            }

            if !response.valid {
                error!("Received invalid response: {}", response.invalid_reason);
                let reason = response.invalid_reason.clone();
                return Err(UdsError::InvalidResponse {
                    response: Box::new(response),
                    reason,
                });
            }
            if response.service != Some(service) {
                let reason = format!(
                    "Response gotten from server has a service ID different than the request service ID. Received={}, Expected={service}",
                    response.service_name()
                );
                error!("{reason}");
                return Err(UdsError::unexpected(response, reason));
            }
            if !response.positive {
                if response.is_response_pending() {
                    if !using_p2_star {
                        single_timeout = self.p2_star_timeout();
                        using_p2_star = true;
                    }
                    info!(
                        "Server requested to wait with response pending. Using P2* timeout ({:.3} sec)",
                        single_timeout.as_secs_f32()
                    );
                    last_pending = Some(response);
                    continue;
                }
                warn!("{response}");
                return Err(UdsError::NegativeResponse(Box::new(response)));
            }
            if wait_nrc {
                let reason =
                    "Received a positive response even if suppress_positive_response was set";
                error!("{reason}");
                return Err(UdsError::unexpected(response, reason));
            }
            debug!("{response}");
            return Ok(Some(response));
        }
    }

    /// Applies the error policy of the configuration to the result of a service call.
    ///
    /// Negative, invalid and unexpected responses are returned as `Ok` (Marked as such) when
    /// the matching `exception_on_*` option is disabled
    pub(crate) fn handle_errors<F>(&mut self, f: F) -> UdsResult<Option<Response>>
    where
        F: FnOnce(&mut Self) -> UdsResult<Option<Response>>,
    {
        match f(self) {
            Err(UdsError::NegativeResponse(response))
                if !self.config.exception_on_negative_response =>
            {
                Ok(Some(*response))
            }
            Err(UdsError::InvalidResponse {
                mut response,
                reason,
            }) if !self.config.exception_on_invalid_response => {
                warn!("Returning invalid response: {reason}");
                response.valid = false;
                response.invalid_reason = reason;
                Ok(Some(*response))
            }
            Err(UdsError::UnexpectedResponse { mut response, reason })
                if !self.config.exception_on_unexpected_response =>
            {
                warn!("Returning unexpected response: {reason}");
                response.unexpected = true;
                Ok(Some(*response))
            }
            other => other,
        }
    }
}

/// Guard returned by [UdsClient::suppress_positive_response].
///
/// The client is used through the guard. Suppression stops when the guard is dropped
#[derive(Debug)]
pub struct SuppressPositiveResponse<'a, C: Connection> {
    client: &'a mut UdsClient<C>,
}

impl<C: Connection> Deref for SuppressPositiveResponse<'_, C> {
    type Target = UdsClient<C>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<C: Connection> DerefMut for SuppressPositiveResponse<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl<C: Connection> Drop for SuppressPositiveResponse<'_, C> {
    fn drop(&mut self) {
        self.client.suppress = None;
    }
}
