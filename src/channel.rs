//! Module for logical communication channels with an ECU
//!
//! Currently, the following channel types are defined:
//! * [Connection] - Payload channel used by the [crate::client::UdsClient]. Every transport implements this
//! * [PacketChannel] - Raw packet channel
//! * [CanChannel] - Raw CAN channel, which software ISO-TP can be layered on top of

use std::time::Duration;

use crate::hardware::isotp::IsoTpError;

/// Communication channel result
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
/// Error produced by a communication channel
pub enum ChannelError {
    /// Underlying IO Error with channel
    #[error("IO error")]
    IOError(
        #[from]
        #[source]
        std::io::Error,
    ),
    /// Timeout when writing data to the channel
    #[error("timeout writing to channel")]
    WriteTimeout,
    /// Timeout when reading from the channel
    #[error("timeout reading from channel")]
    ReadTimeout,
    /// The channel's Rx buffer is empty. Only applies when read timeout is 0
    #[error("channel's Receive buffer is empty")]
    BufferEmpty,
    /// The channels Tx buffer is full
    #[error("channel's Transmit buffer is full")]
    BufferFull,
    /// Unsupported channel request
    #[error("unsupported channel request")]
    UnsupportedRequest,
    /// The interface is not open
    #[error("channel's interface is not open")]
    InterfaceNotOpen,
    /// The other end of the channel has gone away
    #[error("channel disconnected")]
    Disconnected,
    /// ISO-TP framing error
    #[error("ISO-TP error")]
    IsoTp(
        #[from]
        #[source]
        IsoTpError,
    ),
    /// Underlying API error with hardware
    #[error("underlying {api_name} API error ({code}): {desc}")]
    APIError {
        /// Name of the API EG: 'socketCAN'
        api_name: String,
        /// Internal API error code
        code: u8,
        /// API error description
        desc: String,
    },
    /// Channel configuration is invalid
    #[error("channel configuration error")]
    ConfigurationError,
    /// Other channel error
    #[error("{0}")]
    Other(String),
}

/// Payload level connection to an ECU.
///
/// The [crate::client::UdsClient] only needs this contract: full UDS payloads go in
/// via [Connection::send], and come back out via [Connection::wait_frame].
/// Any segmentation (ISO-TP, DoIP, ...) is the transport's business.
pub trait Connection: Send {
    /// Opens the connection
    fn open(&mut self) -> ChannelResult<()>;

    /// Closes the connection
    fn close(&mut self) -> ChannelResult<()>;

    /// Returns true if the connection is open
    fn is_open(&self) -> bool;

    /// Sends a complete payload to the ECU
    fn send(&mut self, payload: &[u8]) -> ChannelResult<()>;

    /// Waits for the next complete payload from the ECU.
    ///
    /// ## Parameters
    /// * timeout - Maximum time to wait. If `None`, waits until a payload arrives
    ///
    /// ## Returns
    /// `Ok(None)` if nothing arrived before the timeout
    fn wait_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>>;

    /// Like [Connection::wait_frame], but a timeout is reported as [ChannelError::ReadTimeout]
    fn recv_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Vec<u8>> {
        self.wait_frame(timeout)?.ok_or(ChannelError::ReadTimeout)
    }

    /// Discards any payload already received but not yet read
    fn empty_rxqueue(&mut self) -> ChannelResult<()>;
}

impl<T: Connection + ?Sized> Connection for Box<T> {
    fn open(&mut self) -> ChannelResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> ChannelResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        (**self).send(payload)
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>> {
        (**self).wait_frame(timeout)
    }

    fn empty_rxqueue(&mut self) -> ChannelResult<()> {
        (**self).empty_rxqueue()
    }
}

/// A network packet
pub trait Packet: Send + Sync + Sized {
    /// Address of the packet
    fn get_address(&self) -> u32;
    /// Data of the packet
    fn get_data(&self) -> &[u8];
}

/// A raw packet channel, such as CAN
pub trait PacketChannel<T: Packet>: Send + Sync {
    /// Opens the channel
    fn open(&mut self) -> ChannelResult<()>;

    /// Closes the channel
    fn close(&mut self) -> ChannelResult<()>;

    /// Writes a list of packets to the raw interface
    fn write_packets(&mut self, packets: Vec<T>, timeout_ms: u32) -> ChannelResult<()>;

    /// Reads up to `max` packets from the interface.
    ///
    /// ## Parameters
    /// * timeout_ms - Timeout for reading packets. If a value of 0 is used, it instructs the channel to immediately
    ///   return with whatever was in its receiving buffer
    fn read_packets(&mut self, max: usize, timeout_ms: u32) -> ChannelResult<Vec<T>>;

    /// Tells the channel to clear its Rx buffer
    fn clear_rx_buffer(&mut self) -> ChannelResult<()>;

    /// Tells the channel to clear its Tx buffer
    fn clear_tx_buffer(&mut self) -> ChannelResult<()>;
}

/// Raw CAN channel
pub trait CanChannel: PacketChannel<CanFrame> {
    /// Configures the CAN channel.
    /// Must be called before [PacketChannel::open]
    fn set_can_cfg(&mut self, baud: u32, use_extended: bool) -> ChannelResult<()>;
}

/// A single CAN frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    dlc: u8,
    data: [u8; 8],
    ext: bool,
}

impl CanFrame {
    /// Creates a new CAN frame. Data past 8 bytes is dropped
    pub fn new(id: u32, data: &[u8], ext: bool) -> Self {
        let dlc = std::cmp::min(data.len(), 8);
        let mut tmp = [0u8; 8];
        tmp[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id,
            dlc: dlc as u8,
            data: tmp,
            ext,
        }
    }

    /// Returns true if this frame uses a 29 bit identifier
    pub fn is_extended(&self) -> bool {
        self.ext
    }
}

impl Packet for CanFrame {
    fn get_address(&self) -> u32 {
        self.id
    }

    fn get_data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// ISO-TP configuration options
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsoTPSettings {
    /// Block size sent in our flow control frames
    pub block_size: u8,
    /// Minimum separation time sent in our flow control frames (Raw STmin byte)
    pub st_min: u8,
    /// Extended ISO-TP addressing (Tx address, Rx address)
    pub extended_addresses: Option<(u8, u8)>,
    /// Pad frames over ISO-TP if data size < 8
    pub pad_frame: bool,
    /// Baud rate of the CAN Network
    pub can_speed: u32,
    /// Does the CAN Network support extended addressing (29bit) or standard addressing (11bit)
    pub can_use_ext_addr: bool,
}

impl Default for IsoTPSettings {
    fn default() -> Self {
        Self {
            block_size: 8,
            st_min: 20,
            extended_addresses: None,
            pad_frame: true,
            can_speed: 500_000,
            can_use_ext_addr: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn can_frame_dlc() {
        let f = CanFrame::new(0x7E0, &[1, 2, 3], false);
        assert_eq!(f.get_data(), &[1, 2, 3]);
        assert_eq!(f.get_address(), 0x7E0);
        let f = CanFrame::new(0x18DA10F1, &[0; 12], true);
        assert_eq!(f.get_data().len(), 8);
        assert!(f.is_extended());
    }
}
