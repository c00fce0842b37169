use std::{
    sync::{Mutex, mpsc},
    thread,
    time::Duration,
};

use uds_client::{
    ClientConfig, UdsClient,
    channel::{CanChannel, CanFrame, ChannelResult, Connection, IsoTPSettings, PacketChannel},
    did::{AsciiCodec, DidConfig, DidValue},
    hardware::isotp::IsoTpConnection,
    uds::ReadDataByIdentifierData,
};

/// One node on an emulated CAN bus with exactly two nodes
struct EmulatedCan {
    tx: mpsc::Sender<CanFrame>,
    rx: Mutex<mpsc::Receiver<CanFrame>>,
}

fn emulated_bus() -> (EmulatedCan, EmulatedCan) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        EmulatedCan {
            tx: a_tx,
            rx: Mutex::new(a_rx),
        },
        EmulatedCan {
            tx: b_tx,
            rx: Mutex::new(b_rx),
        },
    )
}

impl PacketChannel<CanFrame> for EmulatedCan {
    fn open(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn write_packets(&mut self, packets: Vec<CanFrame>, _timeout_ms: u32) -> ChannelResult<()> {
        for p in packets {
            // Other node may already be gone at the end of a test
            let _ = self.tx.send(p);
        }
        Ok(())
    }

    fn read_packets(&mut self, max: usize, _timeout_ms: u32) -> ChannelResult<Vec<CanFrame>> {
        Ok(self.rx.lock().unwrap().try_iter().take(max).collect())
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        while self.rx.lock().unwrap().try_recv().is_ok() {}
        Ok(())
    }

    fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

impl CanChannel for EmulatedCan {
    fn set_can_cfg(&mut self, _baud: u32, _use_extended: bool) -> ChannelResult<()> {
        Ok(())
    }
}

fn pair(
    tester: IsoTPSettings,
    ecu: IsoTPSettings,
) -> (IsoTpConnection<EmulatedCan>, IsoTpConnection<EmulatedCan>) {
    let _ = env_logger::try_init();
    let (a, b) = emulated_bus();
    let mut tester = IsoTpConnection::new(a, 0x7E0, 0x7E8, tester);
    let mut ecu = IsoTpConnection::new(b, 0x7E8, 0x7E0, ecu);
    tester.open().unwrap();
    ecu.open().unwrap();
    (tester, ecu)
}

#[test]
fn long_payload_both_ways() {
    let tester_cfg = IsoTPSettings {
        block_size: 2,
        st_min: 0xF5,
        ..Default::default()
    };
    let ecu_cfg = IsoTPSettings {
        block_size: 3,
        st_min: 1,
        pad_frame: false,
        ..Default::default()
    };
    let (mut tester, mut ecu) = pair(tester_cfg, ecu_cfg);
    let request: Vec<u8> = (0..200u8).collect();
    let response: Vec<u8> = (0..=255u8).rev().collect();

    let resp = response.clone();
    let server = thread::spawn(move || {
        let req = ecu.recv_frame(Some(Duration::from_secs(5))).unwrap();
        ecu.send(&resp).unwrap();
        req
    });
    tester.send(&request).unwrap();
    let got = tester.recv_frame(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(got, response);
    assert_eq!(server.join().unwrap(), request);
}

#[test]
fn largest_payload() {
    let cfg = IsoTPSettings {
        block_size: 0,
        st_min: 0,
        ..Default::default()
    };
    let (mut tester, mut ecu) = pair(cfg, cfg);
    let payload: Vec<u8> = (0..4095).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();
    let server = thread::spawn(move || ecu.recv_frame(Some(Duration::from_secs(10))).unwrap());
    tester.send(&payload).unwrap();
    assert_eq!(server.join().unwrap(), expected);
}

#[test]
fn client_reads_vin_over_isotp() {
    let (tester, mut ecu) = pair(IsoTPSettings::default(), IsoTPSettings::default());
    let server = thread::spawn(move || {
        let req = ecu.recv_frame(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(req, vec![0x22, 0xF1, 0x90]);
        let mut resp = vec![0x62, 0xF1, 0x90];
        resp.extend_from_slice(b"WDB1234567890ABCD");
        ecu.send(&resp).unwrap();
        ecu
    });

    let cfg = ClientConfig {
        data_identifiers: DidConfig::new().with(0xF190, AsciiCodec::new(17)),
        ..Default::default()
    };
    let mut client = UdsClient::new(tester, cfg).unwrap();
    client.open().unwrap();
    let r = client.read_data_by_identifier(&[0xF190]).unwrap().unwrap();
    assert_eq!(
        r.service_data::<ReadDataByIdentifierData>().unwrap().get(0xF190),
        Some(&DidValue::Text("WDB1234567890ABCD".into()))
    );
    server.join().unwrap();
}
