//! Software ISO-TP layer (ISO 15765-2).
//!
//! This is useful for CAN adapters that do not natively support ISO-TP.
//! [IsoTpConnection] takes ownership of a raw [CanChannel], and whilst open, a background
//! thread segments outgoing payloads and reassembles incoming frames into payloads.
use std::{
    cmp::min,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use log::{debug, error, warn};

use crate::channel::{
    CanChannel, CanFrame, ChannelError, ChannelResult, Connection, IsoTPSettings, Packet,
};

/// Largest payload an ISO-TP first frame can announce
pub const MAX_PAYLOAD_SIZE: usize = 4095;

/// Maximum number of consecutive FC(WAIT) frames accepted before giving up
pub const MAX_WAIT_FRAMES: usize = 10;

/// Padding byte used when [IsoTPSettings::pad_frame] is set
pub const PADDING_BYTE: u8 = 0xCC;

/// Time allowed for the receiver to send a flow control frame (N_Bs)
const FLOW_CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Time allowed between two consecutive frames from the sender (N_Cr)
const CONSECUTIVE_FRAME_TIMEOUT: Duration = Duration::from_millis(1000);

const PCI_SINGLE: u8 = 0x00;
const PCI_FIRST: u8 = 0x10;
const PCI_CONSECUTIVE: u8 = 0x20;
const PCI_FLOW_CONTROL: u8 = 0x30;

const FC_CONTINUE: u8 = 0x00;
const FC_WAIT: u8 = 0x01;
const FC_OVERFLOW: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
/// ISO-TP protocol error
pub enum IsoTpError {
    /// Payload cannot be represented by an ISO-TP first frame
    #[error("payload of {0} bytes is larger than the ISO-TP limit of 4095 bytes")]
    PayloadTooLarge(usize),
    /// A consecutive frame arrived out of sequence
    #[error("consecutive frame out of sequence. Expected {expected:X}, got {received:X}")]
    SequenceMismatch {
        /// Sequence number that was expected
        expected: u8,
        /// Sequence number that was received
        received: u8,
    },
    /// The receiver reported an overflow in its flow control frame
    #[error("receiver reported a buffer overflow")]
    Overflow,
    /// The receiver kept asking us to wait
    #[error("receiver sent more than {MAX_WAIT_FRAMES} consecutive wait frames")]
    WaitLimitReached,
    /// The receiver never sent a flow control frame
    #[error("timeout waiting for flow control")]
    FlowControlTimeout,
    /// The sender stopped sending consecutive frames mid payload
    #[error("timeout waiting for consecutive frame")]
    ConsecutiveFrameTimeout,
    /// A frame could not be decoded
    #[error("invalid ISO-TP frame: {0}")]
    InvalidFrame(String),
}

/// Converts a raw STmin byte into the separation time it encodes.
///
/// 0x00-0x7F are milliseconds, 0xF1-0xF9 are 100-900 microseconds.
/// Reserved values are treated as the largest valid value (127ms)
pub fn st_min_duration(raw: u8) -> Duration {
    match raw {
        0x00..=0x7F => Duration::from_millis(raw as u64),
        0xF1..=0xF9 => Duration::from_micros((raw - 0xF0) as u64 * 100),
        _ => Duration::from_millis(0x7F),
    }
}

enum Command {
    Send(Vec<u8>, mpsc::Sender<ChannelResult<()>>),
}

/// Software ISO-TP connection over a raw CAN channel
pub struct IsoTpConnection<C: CanChannel + 'static> {
    channel: Option<C>,
    tx_id: u32,
    rx_id: u32,
    cfg: IsoTPSettings,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<C>>,
    commands: Option<mpsc::Sender<Command>>,
    payloads: Option<mpsc::Receiver<ChannelResult<Vec<u8>>>>,
}

impl<C: CanChannel + 'static> std::fmt::Debug for IsoTpConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsoTpConnection")
            .field("tx_id", &self.tx_id)
            .field("rx_id", &self.rx_id)
            .field("cfg", &self.cfg)
            .field("open", &self.is_open())
            .finish()
    }
}

impl<C: CanChannel + 'static> IsoTpConnection<C> {
    /// Creates a new ISO-TP connection.
    ///
    /// ## Parameters
    /// * channel - Raw CAN channel. It is configured and opened by [Connection::open]
    /// * tx_id - CAN ID the tester sends on
    /// * rx_id - CAN ID the ECU responds on
    /// * cfg - ISO-TP settings
    pub fn new(channel: C, tx_id: u32, rx_id: u32, cfg: IsoTPSettings) -> Self {
        Self {
            channel: Some(channel),
            tx_id,
            rx_id,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            commands: None,
            payloads: None,
        }
    }

    /// Returns the ISO-TP settings in use
    pub fn settings(&self) -> IsoTPSettings {
        self.cfg
    }

    /// Changes the ISO-TP settings. Only possible whilst the connection is closed
    pub fn set_settings(&mut self, cfg: IsoTPSettings) -> ChannelResult<()> {
        if self.is_open() {
            return Err(ChannelError::ConfigurationError);
        }
        self.cfg = cfg;
        Ok(())
    }

    /// Closes the connection and gives back the CAN channel
    pub fn into_inner(mut self) -> ChannelResult<C> {
        self.close()?;
        self.channel.take().ok_or(ChannelError::Disconnected)
    }
}

impl<C: CanChannel + 'static> Connection for IsoTpConnection<C> {
    fn open(&mut self) -> ChannelResult<()> {
        if self.is_open() {
            return Ok(());
        }
        let mut channel = self.channel.take().ok_or(ChannelError::Disconnected)?;
        let res = channel
            .set_can_cfg(self.cfg.can_speed, self.cfg.can_use_ext_addr)
            .and_then(|_| channel.open());
        if let Err(e) = res {
            self.channel = Some(channel);
            return Err(e);
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (payload_tx, payload_rx) = mpsc::channel::<ChannelResult<Vec<u8>>>();
        self.running.store(true, Ordering::Relaxed);
        let worker = Worker {
            channel,
            tx_id: self.tx_id,
            rx_id: self.rx_id,
            cfg: self.cfg,
            running: self.running.clone(),
            commands: cmd_rx,
            payloads: payload_tx,
            rx: None,
            tx: None,
        };
        self.worker = Some(std::thread::spawn(move || worker.run()));
        self.commands = Some(cmd_tx);
        self.payloads = Some(payload_rx);
        debug!(
            "ISO-TP connection opened. Tx: {:08X}, Rx: {:08X}",
            self.tx_id, self.rx_id
        );
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Relaxed);
        self.commands = None;
        self.payloads = None;
        let mut channel = worker
            .join()
            .map_err(|_| ChannelError::Other("ISO-TP worker thread panicked".into()))?;
        let res = channel.close();
        self.channel = Some(channel);
        res
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(IsoTpError::PayloadTooLarge(payload.len()).into());
        }
        let commands = self.commands.as_ref().ok_or(ChannelError::InterfaceNotOpen)?;
        let (tx, rx) = mpsc::channel::<ChannelResult<()>>();
        commands
            .send(Command::Send(payload.to_vec(), tx))
            .map_err(|_| ChannelError::Disconnected)?;
        rx.recv().map_err(|_| ChannelError::Disconnected)?
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>> {
        let payloads = self.payloads.as_ref().ok_or(ChannelError::InterfaceNotOpen)?;
        let res = match timeout {
            Some(t) => match payloads.recv_timeout(t) {
                Ok(r) => r,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(ChannelError::Disconnected),
            },
            None => payloads.recv().map_err(|_| ChannelError::Disconnected)?,
        };
        res.map(Some)
    }

    fn empty_rxqueue(&mut self) -> ChannelResult<()> {
        if let Some(payloads) = self.payloads.as_ref() {
            while payloads.try_recv().is_ok() {}
        }
        Ok(())
    }
}

impl<C: CanChannel + 'static> Drop for IsoTpConnection<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing ISO-TP connection: {e}");
        }
    }
}

struct RxState {
    data: Vec<u8>,
    size: usize,
    next_seq: u8,
    block_count: u8,
    last_frame: Instant,
}

struct TxState {
    data: Vec<u8>,
    pos: usize,
    next_seq: u8,
    awaiting_fc: bool,
    wait_count: usize,
    block_size: u8,
    block_count: u8,
    st_min: Duration,
    last_frame: Instant,
    reply: mpsc::Sender<ChannelResult<()>>,
}

struct Worker<C: CanChannel> {
    channel: C,
    tx_id: u32,
    rx_id: u32,
    cfg: IsoTPSettings,
    running: Arc<AtomicBool>,
    commands: mpsc::Receiver<Command>,
    payloads: mpsc::Sender<ChannelResult<Vec<u8>>>,
    rx: Option<RxState>,
    tx: Option<TxState>,
}

impl<C: CanChannel> Worker<C> {
    fn run(mut self) -> C {
        while self.running.load(Ordering::Relaxed) {
            let mut busy = false;
            match self.commands.try_recv() {
                Ok(Command::Send(data, reply)) => {
                    busy = true;
                    self.start_tx(data, reply);
                }
                Err(mpsc::TryRecvError::Disconnected) => break,
                Err(mpsc::TryRecvError::Empty) => {}
            }
            match self.channel.read_packets(32, 0) {
                Ok(frames) => {
                    for frame in frames {
                        busy = true;
                        self.on_frame(&frame);
                    }
                }
                Err(ChannelError::BufferEmpty) | Err(ChannelError::ReadTimeout) => {}
                Err(e) => error!("Error reading CAN frames: {e}"),
            }
            if self.poll_tx() {
                busy = true;
            }
            self.poll_rx();
            if !busy {
                std::thread::sleep(Duration::from_micros(200));
            }
        }
        self.channel
    }

    /// Bytes reserved at the start of every frame for the extended address
    fn addr_len(&self) -> usize {
        self.cfg.extended_addresses.map_or(0, |_| 1)
    }

    fn write_frame(&mut self, pci_and_data: &[u8]) -> ChannelResult<()> {
        let mut raw = Vec::with_capacity(8);
        if let Some((tx_ext, _)) = self.cfg.extended_addresses {
            raw.push(tx_ext);
        }
        raw.extend_from_slice(pci_and_data);
        if self.cfg.pad_frame {
            raw.resize(8, PADDING_BYTE);
        }
        debug!("ISO-TP Tx: {raw:02X?}");
        let frame = CanFrame::new(self.tx_id, &raw, self.cfg.can_use_ext_addr);
        self.channel.write_packets(vec![frame], 0)
    }

    fn send_flow_control(&mut self, flag: u8) {
        let fc = [PCI_FLOW_CONTROL | flag, self.cfg.block_size, self.cfg.st_min];
        if let Err(e) = self.write_frame(&fc) {
            error!("Could not send flow control: {e}");
        }
    }

    fn start_tx(&mut self, data: Vec<u8>, reply: mpsc::Sender<ChannelResult<()>>) {
        if self.tx.is_some() {
            let _ = reply.send(Err(ChannelError::BufferFull));
            return;
        }
        let space = 7 - self.addr_len();
        if data.len() <= space {
            let mut sf = vec![PCI_SINGLE | data.len() as u8];
            sf.extend_from_slice(&data);
            let _ = reply.send(self.write_frame(&sf));
            return;
        }
        let first = space - 1;
        let mut ff = vec![PCI_FIRST | ((data.len() >> 8) & 0x0F) as u8, (data.len() & 0xFF) as u8];
        ff.extend_from_slice(&data[..first]);
        if let Err(e) = self.write_frame(&ff) {
            let _ = reply.send(Err(e));
            return;
        }
        self.tx = Some(TxState {
            data,
            pos: first,
            next_seq: 1,
            awaiting_fc: true,
            wait_count: 0,
            block_size: 0,
            block_count: 0,
            st_min: Duration::ZERO,
            last_frame: Instant::now(),
            reply,
        });
    }

    fn finish_tx(&mut self, res: ChannelResult<()>) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = &res {
                error!("ISO-TP transmission failed: {e}");
            }
            let _ = tx.reply.send(res);
        }
    }

    /// Sends the next consecutive frame if allowed. Returns true if a frame was sent
    fn poll_tx(&mut self) -> bool {
        let space = 7 - self.addr_len();
        let Some(tx) = self.tx.as_mut() else {
            return false;
        };
        if tx.awaiting_fc {
            if tx.last_frame.elapsed() > FLOW_CONTROL_TIMEOUT {
                self.finish_tx(Err(IsoTpError::FlowControlTimeout.into()));
            }
            return false;
        }
        if tx.last_frame.elapsed() < tx.st_min {
            return false;
        }
        let len = min(space, tx.data.len() - tx.pos);
        let mut cf = vec![PCI_CONSECUTIVE | tx.next_seq];
        cf.extend_from_slice(&tx.data[tx.pos..tx.pos + len]);
        tx.pos += len;
        tx.next_seq = (tx.next_seq + 1) & 0x0F;
        tx.last_frame = Instant::now();
        let done = tx.pos >= tx.data.len();
        if !done && tx.block_size != 0 {
            tx.block_count += 1;
            if tx.block_count == tx.block_size {
                tx.awaiting_fc = true;
            }
        }
        match self.write_frame(&cf) {
            Err(e) => self.finish_tx(Err(e)),
            Ok(()) if done => self.finish_tx(Ok(())),
            Ok(()) => {}
        }
        true
    }

    fn poll_rx(&mut self) {
        if let Some(rx) = &self.rx {
            if rx.last_frame.elapsed() > CONSECUTIVE_FRAME_TIMEOUT {
                self.rx = None;
                let _ = self
                    .payloads
                    .send(Err(IsoTpError::ConsecutiveFrameTimeout.into()));
            }
        }
    }

    fn reject(&mut self, err: IsoTpError) {
        warn!("{err}");
        let _ = self.payloads.send(Err(err.into()));
    }

    fn on_frame(&mut self, frame: &CanFrame) {
        if frame.get_address() != self.rx_id {
            return;
        }
        let raw = frame.get_data();
        let data = match self.cfg.extended_addresses {
            Some((_, rx_ext)) => match raw.split_first() {
                Some((addr, rest)) if *addr == rx_ext => rest,
                _ => return,
            },
            None => raw,
        };
        let Some(&pci) = data.first() else {
            error!("ISO-TP frame too short! {frame:?}");
            return;
        };
        debug!("ISO-TP Rx: {raw:02X?}");
        match pci & 0xF0 {
            PCI_SINGLE => self.on_single_frame(data),
            PCI_FIRST => self.on_first_frame(data),
            PCI_CONSECUTIVE => self.on_consecutive_frame(data),
            PCI_FLOW_CONTROL => self.on_flow_control(data),
            _ => error!("Invalid ISO-TP frame! {frame:?}"),
        }
    }

    fn on_single_frame(&mut self, data: &[u8]) {
        let len = (data[0] & 0x0F) as usize;
        if len == 0 || len > data.len() - 1 {
            self.reject(IsoTpError::InvalidFrame(format!(
                "single frame announces {len} bytes but carries {}",
                data.len() - 1
            )));
            return;
        }
        if self.rx.take().is_some() {
            warn!("Single frame received mid reception, previous payload dropped");
        }
        let _ = self.payloads.send(Ok(data[1..1 + len].to_vec()));
    }

    fn on_first_frame(&mut self, data: &[u8]) {
        if data.len() < 2 {
            self.reject(IsoTpError::InvalidFrame("first frame too short".into()));
            return;
        }
        let size = (((data[0] & 0x0F) as usize) << 8) | data[1] as usize;
        if size <= 7 - self.addr_len() {
            self.reject(IsoTpError::InvalidFrame(format!(
                "first frame announces {size} bytes, which fits a single frame"
            )));
            return;
        }
        if self.rx.is_some() {
            warn!("First frame received mid reception, restarting");
        }
        let mut buf = Vec::with_capacity(size);
        buf.extend_from_slice(&data[2..min(data.len(), 2 + size)]);
        self.rx = Some(RxState {
            data: buf,
            size,
            next_seq: 1,
            block_count: 0,
            last_frame: Instant::now(),
        });
        self.send_flow_control(FC_CONTINUE);
    }

    fn on_consecutive_frame(&mut self, data: &[u8]) {
        let block_size = self.cfg.block_size;
        let Some(rx) = self.rx.as_mut() else {
            debug!("Consecutive frame without a first frame, ignoring");
            return;
        };
        let seq = data[0] & 0x0F;
        if seq != rx.next_seq {
            let expected = rx.next_seq;
            self.rx = None;
            self.reject(IsoTpError::SequenceMismatch {
                expected,
                received: seq,
            });
            return;
        }
        let take = min(rx.size - rx.data.len(), data.len() - 1);
        rx.data.extend_from_slice(&data[1..1 + take]);
        rx.next_seq = (rx.next_seq + 1) & 0x0F;
        rx.last_frame = Instant::now();
        if rx.data.len() == rx.size {
            if let Some(rx) = self.rx.take() {
                let _ = self.payloads.send(Ok(rx.data));
            }
            return;
        }
        rx.block_count += 1;
        if block_size != 0 && rx.block_count == block_size {
            rx.block_count = 0;
            self.send_flow_control(FC_CONTINUE);
        }
    }

    fn on_flow_control(&mut self, data: &[u8]) {
        let Some(tx) = self.tx.as_mut() else {
            debug!("Flow control without a transmission in progress, ignoring");
            return;
        };
        if !tx.awaiting_fc {
            debug!("Unexpected flow control mid block, ignoring");
            return;
        }
        if data.len() < 3 {
            self.finish_tx(Err(IsoTpError::InvalidFrame("flow control too short".into()).into()));
            return;
        }
        match data[0] & 0x0F {
            FC_CONTINUE => {
                tx.awaiting_fc = false;
                tx.wait_count = 0;
                tx.block_size = data[1];
                tx.block_count = 0;
                tx.st_min = st_min_duration(data[2]);
                // First CF may go out immediately
                tx.last_frame = Instant::now()
                    .checked_sub(tx.st_min)
                    .unwrap_or_else(Instant::now);
            }
            FC_WAIT => {
                tx.wait_count += 1;
                tx.last_frame = Instant::now();
                if tx.wait_count > MAX_WAIT_FRAMES {
                    self.finish_tx(Err(IsoTpError::WaitLimitReached.into()));
                }
            }
            FC_OVERFLOW => self.finish_tx(Err(IsoTpError::Overflow.into())),
            flag => self.finish_tx(Err(IsoTpError::InvalidFrame(format!(
                "unknown flow status {flag:X}"
            ))
            .into())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::channel::PacketChannel;

    /// CAN channel whose other end is held by the test
    struct TestCan {
        to_bus: mpsc::Sender<CanFrame>,
        from_bus: Mutex<mpsc::Receiver<CanFrame>>,
    }

    struct Bus {
        to_node: mpsc::Sender<CanFrame>,
        from_node: mpsc::Receiver<CanFrame>,
    }

    impl Bus {
        fn inject(&self, id: u32, data: &[u8]) {
            self.to_node.send(CanFrame::new(id, data, false)).unwrap();
        }

        fn next(&self) -> CanFrame {
            self.from_node.recv_timeout(Duration::from_secs(2)).unwrap()
        }
    }

    fn test_can() -> (TestCan, Bus) {
        let (to_bus, from_node) = mpsc::channel();
        let (to_node, from_bus) = mpsc::channel();
        (
            TestCan {
                to_bus,
                from_bus: Mutex::new(from_bus),
            },
            Bus { to_node, from_node },
        )
    }

    impl PacketChannel<CanFrame> for TestCan {
        fn open(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn close(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn write_packets(&mut self, packets: Vec<CanFrame>, _timeout_ms: u32) -> ChannelResult<()> {
            for p in packets {
                self.to_bus.send(p).map_err(|_| ChannelError::Disconnected)?;
            }
            Ok(())
        }

        fn read_packets(&mut self, max: usize, _timeout_ms: u32) -> ChannelResult<Vec<CanFrame>> {
            let rx = self.from_bus.lock().unwrap();
            Ok(rx.try_iter().take(max).collect())
        }

        fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
            Ok(())
        }
    }

    impl CanChannel for TestCan {
        fn set_can_cfg(&mut self, _baud: u32, _use_extended: bool) -> ChannelResult<()> {
            Ok(())
        }
    }

    fn open(cfg: IsoTPSettings) -> (IsoTpConnection<TestCan>, Bus) {
        let _ = env_logger::try_init();
        let (can, bus) = test_can();
        let mut conn = IsoTpConnection::new(can, 0x7E0, 0x7E8, cfg);
        conn.open().unwrap();
        (conn, bus)
    }

    #[test]
    fn st_min_encoding() {
        assert_eq!(st_min_duration(0x00), Duration::ZERO);
        assert_eq!(st_min_duration(0x7F), Duration::from_millis(127));
        assert_eq!(st_min_duration(0xF1), Duration::from_micros(100));
        assert_eq!(st_min_duration(0xF9), Duration::from_micros(900));
        assert_eq!(st_min_duration(0x80), Duration::from_millis(127));
        assert_eq!(st_min_duration(0xFA), Duration::from_millis(127));
    }

    #[test]
    fn single_frame_padded() {
        let (mut conn, bus) = open(IsoTPSettings::default());
        conn.send(&[0x3E, 0x00]).unwrap();
        let f = bus.next();
        assert_eq!(f.get_address(), 0x7E0);
        assert_eq!(f.get_data(), &[0x02, 0x3E, 0x00, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);

        bus.inject(0x7E8, &[0x02, 0x7E, 0x00, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);
        bus.inject(0x7E9, &[0x02, 0x7E, 0x00]);
        assert_eq!(
            conn.wait_frame(Some(Duration::from_secs(1))).unwrap(),
            Some(vec![0x7E, 0x00])
        );
        assert_eq!(conn.wait_frame(Some(Duration::from_millis(50))).unwrap(), None);
    }

    #[test]
    fn multi_frame_rx_sends_flow_control() {
        let cfg = IsoTPSettings {
            block_size: 0,
            st_min: 0,
            pad_frame: false,
            ..Default::default()
        };
        let (mut conn, bus) = open(cfg);
        bus.inject(0x7E8, &[0x10, 0x0A, 0x62, 0xF1, 0x90, 1, 2, 3]);
        let fc = bus.next();
        assert_eq!(fc.get_data(), &[0x30, 0x00, 0x00]);
        bus.inject(0x7E8, &[0x21, 4, 5, 6, 7]);
        assert_eq!(
            conn.wait_frame(Some(Duration::from_secs(1))).unwrap(),
            Some(vec![0x62, 0xF1, 0x90, 1, 2, 3, 4, 5, 6, 7])
        );
    }

    #[test]
    fn sequence_mismatch() {
        let (mut conn, bus) = open(IsoTPSettings::default());
        bus.inject(0x7E8, &[0x10, 0x14, 0x62, 0xF1, 0x90, 1, 2, 3]);
        bus.next();
        bus.inject(0x7E8, &[0x22, 4, 5, 6, 7, 8, 9, 10]);
        assert!(matches!(
            conn.wait_frame(Some(Duration::from_secs(1))),
            Err(ChannelError::IsoTp(IsoTpError::SequenceMismatch {
                expected: 1,
                received: 2
            }))
        ));
    }

    #[test]
    fn overflow_aborts_send() {
        let (mut conn, bus) = open(IsoTPSettings::default());
        let h = std::thread::spawn(move || {
            let ff = bus.next();
            assert_eq!(&ff.get_data()[..2], &[0x10, 0x0A]);
            bus.inject(0x7E8, &[0x32, 0x00, 0x00]);
            bus
        });
        let res = conn.send(&[0x2E, 0xF1, 0x90, 1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(res, Err(ChannelError::IsoTp(IsoTpError::Overflow))));
        h.join().unwrap();
    }

    #[test]
    fn wait_limit() {
        let (mut conn, bus) = open(IsoTPSettings::default());
        let h = std::thread::spawn(move || {
            bus.next();
            for _ in 0..=MAX_WAIT_FRAMES {
                bus.inject(0x7E8, &[0x31, 0x00, 0x00]);
            }
            bus
        });
        let res = conn.send(&[0u8; 20]);
        assert!(matches!(res, Err(ChannelError::IsoTp(IsoTpError::WaitLimitReached))));
        h.join().unwrap();
    }

    #[test]
    fn payload_too_large() {
        let (mut conn, _bus) = open(IsoTPSettings::default());
        assert!(matches!(
            conn.send(&[0u8; 4096]),
            Err(ChannelError::IsoTp(IsoTpError::PayloadTooLarge(4096)))
        ));
    }

    #[test]
    fn block_size_respected() {
        let cfg = IsoTPSettings {
            pad_frame: false,
            ..Default::default()
        };
        let (mut conn, bus) = open(cfg);
        let h = std::thread::spawn(move || {
            let ff = bus.next();
            assert_eq!(ff.get_data(), &[0x10, 20, 0, 1, 2, 3, 4, 5]);
            bus.inject(0x7E8, &[0x30, 0x01, 0x00]);
            assert_eq!(bus.next().get_data(), &[0x21, 6, 7, 8, 9, 10, 11, 12]);
            // Must not send another CF until the next FC
            assert!(bus.from_node.recv_timeout(Duration::from_millis(50)).is_err());
            bus.inject(0x7E8, &[0x30, 0x00, 0x00]);
            assert_eq!(bus.next().get_data(), &[0x22, 13, 14, 15, 16, 17, 18, 19]);
            bus
        });
        let payload: Vec<u8> = (0..20).collect();
        conn.send(&payload).unwrap();
        h.join().unwrap();
    }

    #[test]
    fn extended_addressing() {
        let cfg = IsoTPSettings {
            extended_addresses: Some((0xF1, 0x10)),
            pad_frame: false,
            ..Default::default()
        };
        let (mut conn, bus) = open(cfg);
        conn.send(&[0x3E, 0x00]).unwrap();
        assert_eq!(bus.next().get_data(), &[0xF1, 0x02, 0x3E, 0x00]);
        bus.inject(0x7E8, &[0x22, 0x02, 0x7E, 0x00]);
        bus.inject(0x7E8, &[0x10, 0x02, 0x7E, 0x01]);
        assert_eq!(
            conn.wait_frame(Some(Duration::from_secs(1))).unwrap(),
            Some(vec![0x7E, 0x01])
        );
    }

    #[test]
    fn reopen_after_close() {
        let (mut conn, _bus) = open(IsoTPSettings::default());
        conn.close().unwrap();
        assert!(!conn.is_open());
        assert!(matches!(conn.send(&[0x3E, 0x00]), Err(ChannelError::InterfaceNotOpen)));
        conn.open().unwrap();
        assert!(conn.is_open());
    }
}
