//! In-process queue transport.
//!
//! [QueueConnection] is handed to the client, and the matching [QueueEndpoint]
//! plays the ECU, usually from another thread.

use std::{sync::mpsc, time::Duration};

use log::warn;

use crate::channel::{ChannelError, ChannelResult, Connection};

/// Default maximum payload size, matching the ISO-TP limit
pub const DEFAULT_MTU: usize = 4095;

/// Client side of a queue transport
#[derive(Debug)]
pub struct QueueConnection {
    to_server: mpsc::Sender<Vec<u8>>,
    from_server: mpsc::Receiver<Vec<u8>>,
    mtu: usize,
    opened: bool,
}

/// Server side of a queue transport
#[derive(Debug)]
pub struct QueueEndpoint {
    to_client: mpsc::Sender<Vec<u8>>,
    from_client: mpsc::Receiver<Vec<u8>>,
}

impl QueueConnection {
    /// Creates a connected client/server pair
    pub fn new() -> (Self, QueueEndpoint) {
        Self::with_mtu(DEFAULT_MTU)
    }

    /// Creates a connected client/server pair. Payloads longer than `mtu` are truncated
    pub fn with_mtu(mtu: usize) -> (Self, QueueEndpoint) {
        let (to_server, from_client) = mpsc::channel();
        let (to_client, from_server) = mpsc::channel();
        (
            Self {
                to_server,
                from_server,
                mtu,
                opened: false,
            },
            QueueEndpoint {
                to_client,
                from_client,
            },
        )
    }
}

impl Connection for QueueConnection {
    fn open(&mut self) -> ChannelResult<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.opened = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        if !self.opened {
            return Err(ChannelError::InterfaceNotOpen);
        }
        let mut payload = payload.to_vec();
        if payload.len() > self.mtu {
            warn!(
                "Truncating outgoing payload from {} to {} bytes (MTU)",
                payload.len(),
                self.mtu
            );
            payload.truncate(self.mtu);
        }
        self.to_server
            .send(payload)
            .map_err(|_| ChannelError::Disconnected)
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>> {
        if !self.opened {
            return Err(ChannelError::InterfaceNotOpen);
        }
        match timeout {
            Some(t) => match self.from_server.recv_timeout(t) {
                Ok(mut p) => {
                    if p.len() > self.mtu {
                        warn!("Truncating incoming payload from {} to {} bytes (MTU)", p.len(), self.mtu);
                        p.truncate(self.mtu);
                    }
                    Ok(Some(p))
                }
                Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(ChannelError::Disconnected),
            },
            None => self
                .from_server
                .recv()
                .map(Some)
                .map_err(|_| ChannelError::Disconnected),
        }
    }

    fn empty_rxqueue(&mut self) -> ChannelResult<()> {
        while self.from_server.try_recv().is_ok() {}
        Ok(())
    }
}

impl QueueEndpoint {
    /// Waits for the next request sent by the client. Returns `None` on timeout or
    /// if the client went away
    pub fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_client.recv_timeout(timeout).ok()
    }

    /// Sends a response to the client
    pub fn send(&self, payload: &[u8]) -> ChannelResult<()> {
        self.to_client
            .send(payload.to_vec())
            .map_err(|_| ChannelError::Disconnected)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exchange() {
        let (mut c, server) = QueueConnection::new();
        assert!(matches!(c.send(&[0x3E, 0x00]), Err(ChannelError::InterfaceNotOpen)));
        c.open().unwrap();
        c.send(&[0x3E, 0x00]).unwrap();
        assert_eq!(server.recv(Duration::from_millis(100)), Some(vec![0x3E, 0x00]));
        server.send(&[0x7E, 0x00]).unwrap();
        assert_eq!(
            c.wait_frame(Some(Duration::from_millis(100))).unwrap(),
            Some(vec![0x7E, 0x00])
        );
        assert_eq!(c.wait_frame(Some(Duration::from_millis(10))).unwrap(), None);
        assert!(matches!(
            c.recv_frame(Some(Duration::from_millis(10))),
            Err(ChannelError::ReadTimeout)
        ));
    }

    #[test]
    fn mtu_truncates() {
        let (mut c, server) = QueueConnection::with_mtu(4);
        c.open().unwrap();
        c.send(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(server.recv(Duration::from_millis(100)), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn empty_rxqueue_discards_stale() {
        let (mut c, server) = QueueConnection::new();
        c.open().unwrap();
        server.send(&[0x50, 0x01]).unwrap();
        c.empty_rxqueue().unwrap();
        assert_eq!(c.wait_frame(Some(Duration::from_millis(10))).unwrap(), None);
    }

    #[test]
    fn server_gone() {
        let (mut c, server) = QueueConnection::new();
        c.open().unwrap();
        drop(server);
        assert!(matches!(c.send(&[0x3E]), Err(ChannelError::Disconnected)));
    }
}
