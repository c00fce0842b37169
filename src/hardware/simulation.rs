//! Simulation transport for unit testing diagnostic clients.
//!
//! Responses are scripted per request payload. Clones share the same state, so a
//! test can keep one handle to script and inspect while the client owns another.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::debug;

use crate::channel::{ChannelError, ChannelResult, Connection};

#[derive(Debug, Default)]
struct SimState {
    responses: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    rx_queue: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    opened: bool,
}

/// Scripted transport. Every payload sent is logged, and if it matches a scripted
/// request, the scripted responses are queued in order
#[derive(Debug, Clone, Default)]
pub struct SimulationConnection {
    state: Arc<Mutex<SimState>>,
}

impl SimulationConnection {
    /// Creates a simulation with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scripts a single response to `req`
    pub fn add_response(&self, req: &[u8], resp: &[u8]) {
        self.add_responses(req, vec![resp.to_vec()]);
    }

    /// Scripts a sequence of responses to `req`, replacing any previous script
    pub fn add_responses(&self, req: &[u8], resps: Vec<Vec<u8>>) {
        self.state().responses.insert(req.to_vec(), resps);
    }

    /// Queues a payload as if the ECU sent it unprompted
    pub fn push_frame(&self, payload: &[u8]) {
        self.state().rx_queue.push_back(payload.to_vec());
    }

    /// Returns every payload sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    /// Removes all scripted responses, queued frames and the sent log
    pub fn clear(&self) {
        let mut s = self.state();
        s.responses.clear();
        s.rx_queue.clear();
        s.sent.clear();
    }
}

impl Connection for SimulationConnection {
    fn open(&mut self) -> ChannelResult<()> {
        self.state().opened = true;
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.state().opened = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().opened
    }

    fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        let mut s = self.state();
        if !s.opened {
            return Err(ChannelError::InterfaceNotOpen);
        }
        s.sent.push(payload.to_vec());
        if let Some(resps) = s.responses.get(payload).cloned() {
            s.rx_queue.extend(resps);
        } else {
            debug!("Simulation has no response for {payload:02X?}");
        }
        Ok(())
    }

    /// Never blocks. An empty queue is reported as a timeout straight away
    fn wait_frame(&mut self, _timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>> {
        let mut s = self.state();
        if !s.opened {
            return Err(ChannelError::InterfaceNotOpen);
        }
        Ok(s.rx_queue.pop_front())
    }

    fn empty_rxqueue(&mut self) -> ChannelResult<()> {
        self.state().rx_queue.clear();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scripted_responses() {
        let sim = SimulationConnection::new();
        sim.add_responses(&[0x10, 0x03], vec![vec![0x7F, 0x10, 0x78], vec![0x50, 0x03]]);
        let mut c = sim.clone();
        c.open().unwrap();
        c.send(&[0x10, 0x03]).unwrap();
        c.send(&[0x11, 0x01]).unwrap();
        assert_eq!(c.wait_frame(None).unwrap(), Some(vec![0x7F, 0x10, 0x78]));
        assert_eq!(c.wait_frame(None).unwrap(), Some(vec![0x50, 0x03]));
        assert_eq!(c.wait_frame(None).unwrap(), None);
        assert_eq!(sim.sent(), vec![vec![0x10, 0x03], vec![0x11, 0x01]]);
    }

    #[test]
    fn closed() {
        let mut c = SimulationConnection::new();
        assert!(matches!(c.send(&[0x3E]), Err(ChannelError::InterfaceNotOpen)));
    }
}
