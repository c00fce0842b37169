//! SocketCAN module.
//!
//! Uses the Linux kernel's ISO-TP sockets, so segmentation and flow control are handled by the OS

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use socketcan_isotp::{
    ExtendedId, FlowControlOptions, Id, IsoTpBehaviour, IsoTpOptions, IsoTpSocket,
    LinkLayerOptions, StandardId,
};

use crate::channel::{ChannelError, ChannelResult, Connection, IsoTPSettings};

/// Kernel ISO-TP connection to an ECU
pub struct SocketCanIsoTpConnection {
    if_name: String,
    channel: Option<IsoTpSocket>,
    /// Tx ID, Rx ID
    ids: (u32, u32),
    cfg: IsoTPSettings,
}

impl std::fmt::Debug for SocketCanIsoTpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketCanIsoTpConnection")
            .field("if_name", &self.if_name)
            .field("ids", &self.ids)
            .field("cfg", &self.cfg)
            .field("open", &self.channel.is_some())
            .finish()
    }
}

impl SocketCanIsoTpConnection {
    /// Creates a new connection on interface `if_name` (EG: `can0`).
    /// Tester sends on `tx_id`, ECU responds on `rx_id`
    pub fn new(if_name: &str, tx_id: u32, rx_id: u32, cfg: IsoTPSettings) -> Self {
        Self {
            if_name: if_name.to_string(),
            channel: None,
            ids: (tx_id, rx_id),
            cfg,
        }
    }

    /// Returns true if the network interface exists
    pub fn is_connected(&self) -> bool {
        PathBuf::from(format!("/sys/class/net/{}", self.if_name)).exists()
    }

    fn safe_with_iface<X, T: FnOnce(&mut IsoTpSocket) -> ChannelResult<X>>(
        &mut self,
        function: T,
    ) -> ChannelResult<X> {
        match self.channel.as_mut() {
            Some(channel) => function(channel),
            None => Err(ChannelError::InterfaceNotOpen),
        }
    }

    fn can_id(&self, id: u32) -> ChannelResult<Id> {
        if self.cfg.can_use_ext_addr {
            ExtendedId::new(id).map(Id::Extended)
        } else {
            u16::try_from(id)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard)
        }
        .ok_or(ChannelError::ConfigurationError)
    }
}

/// Lists CAN network interfaces present on the system
pub fn list_interfaces() -> Vec<String> {
    match std::fs::read_dir("/sys/class/net/") {
        Ok(paths) => paths
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.contains("can"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

impl Connection for SocketCanIsoTpConnection {
    fn open(&mut self) -> ChannelResult<()> {
        if self.channel.is_some() {
            return Ok(());
        }
        let mut flags = IsoTpBehaviour::empty();
        let (ext_address, rx_ext_address) = match self.cfg.extended_addresses {
            Some((tx, rx)) => {
                flags |= IsoTpBehaviour::CAN_ISOTP_EXTEND_ADDR | IsoTpBehaviour::CAN_ISOTP_RX_EXT_ADDR;
                (tx, rx)
            }
            None => (0, 0),
        };
        if self.cfg.pad_frame {
            flags |= IsoTpBehaviour::CAN_ISOTP_TX_PADDING;
        }

        let opts = IsoTpOptions::new(
            flags,
            Duration::from_millis(0),
            ext_address,
            0xCC,
            0xCC,
            rx_ext_address,
        )
        .map_err(std::io::Error::other)?;
        let fc_opts = FlowControlOptions::new(self.cfg.block_size, self.cfg.st_min, 0);
        let tx_id = self.can_id(self.ids.0)?;
        let rx_id = self.can_id(self.ids.1)?;

        let socket = IsoTpSocket::open_with_opts(
            &self.if_name,
            rx_id,
            tx_id,
            Some(opts),
            Some(fc_opts),
            Some(LinkLayerOptions::default()),
        )?;
        socket.set_nonblocking(true)?;
        log::debug!("SocketCAN ISO-TP socket opened on {}", self.if_name);
        self.channel = Some(socket);
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.channel = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        self.safe_with_iface(|socket| {
            socket.write(payload)?;
            Ok(())
        })
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> ChannelResult<Option<Vec<u8>>> {
        let start = Instant::now();
        self.safe_with_iface(|socket| {
            loop {
                match socket.read() {
                    Ok(data) => return Ok(Some(data.to_vec())),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
                if timeout.is_some_and(|t| start.elapsed() >= t) {
                    return Ok(None);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    }

    fn empty_rxqueue(&mut self) -> ChannelResult<()> {
        self.safe_with_iface(|socket| {
            while socket.read().is_ok() {}
            Ok(())
        })
    }
}

impl Drop for SocketCanIsoTpConnection {
    #[allow(unused_must_use)]
    fn drop(&mut self) {
        self.close();
    }
}

impl From<socketcan_isotp::Error> for ChannelError {
    fn from(e: socketcan_isotp::Error) -> Self {
        Self::APIError {
            api_name: "socketCAN".into(),
            code: 99,
            desc: e.to_string(),
        }
    }
}
