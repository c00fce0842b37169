use uds_client::{
    ClientConfig, UdsClient, UdsError,
    config::SecurityAlgorithm,
    did::{AsciiCodec, DidConfig, DidValue, PackCodec},
    hardware::simulation::SimulationConnection,
    uds::{
        DtcReportType, ReadDataByIdentifierData, ReadDtcInformationData, ResponseCode,
        RoutineControlData, SecurityAccessData,
    },
};

fn client(sim: &SimulationConnection, cfg: ClientConfig) -> UdsClient<SimulationConnection> {
    let _ = env_logger::try_init();
    let mut c = UdsClient::new(sim.clone(), cfg).unwrap();
    c.open().unwrap();
    c
}

#[test]
fn negative_response_policy() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x10, 0x03], &[0x7F, 0x10, 0x22]);

    let mut c = client(&sim, ClientConfig::default());
    match c.change_session(0x03) {
        Err(UdsError::NegativeResponse(r)) => {
            assert_eq!(r.response_code(), Some(ResponseCode::ConditionsNotCorrect))
        }
        other => panic!("Expected a negative response error, got {other:?}"),
    }

    let cfg = ClientConfig {
        exception_on_negative_response: false,
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    let r = c.change_session(0x03).unwrap().unwrap();
    assert!(!r.positive);
    assert_eq!(r.code, 0x22);
}

#[test]
fn invalid_response_policy() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x11, 0x01], &[0x51]);

    let mut c = client(&sim, ClientConfig::default());
    assert!(matches!(c.ecu_reset(0x01), Err(UdsError::InvalidResponse { .. })));

    let cfg = ClientConfig {
        exception_on_invalid_response: false,
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    let r = c.ecu_reset(0x01).unwrap().unwrap();
    assert!(!r.valid);
    assert!(!r.invalid_reason.is_empty());
}

#[test]
fn unexpected_echo_policy() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x10, 0x03], &[0x50, 0x02, 0x00, 0x32, 0x01, 0xF4]);

    let mut c = client(&sim, ClientConfig::default());
    assert!(matches!(c.change_session(0x03), Err(UdsError::UnexpectedResponse { .. })));

    let cfg = ClientConfig {
        exception_on_unexpected_response: false,
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    let r = c.change_session(0x03).unwrap().unwrap();
    assert!(r.unexpected);
    assert!(r.valid);
}

#[test]
fn session_timing_from_server() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x10, 0x03], &[0x50, 0x03, 0x00, 0x32, 0x01, 0xF4]);
    let mut c = client(&sim, ClientConfig::default());
    c.change_session(0x03).unwrap();
    assert_eq!(c.p2_timeout(), std::time::Duration::from_millis(50));
    assert_eq!(c.p2_star_timeout(), std::time::Duration::from_millis(5000));

    let cfg = ClientConfig {
        use_server_timing: false,
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    c.change_session(0x03).unwrap();
    assert_eq!(c.p2_timeout(), std::time::Duration::from_secs(1));
}

#[test]
fn unlock_security_access() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x27, 0x01], &[0x67, 0x01, 0x11, 0x22]);
    sim.add_response(&[0x27, 0x02, 0xEE, 0xDD], &[0x67, 0x02]);
    let cfg = ClientConfig {
        security_algo: Some(SecurityAlgorithm::new(|level, seed, _| {
            assert_eq!(level, 0x01);
            seed.iter().map(|b| !b).collect()
        })),
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    let r = c.unlock_security_access(0x01, None).unwrap().unwrap();
    assert_eq!(r.service_data::<SecurityAccessData>().unwrap().security_level_echo, 0x02);
    assert_eq!(sim.sent(), vec![vec![0x27, 0x01], vec![0x27, 0x02, 0xEE, 0xDD]]);
}

#[test]
fn unlock_without_algorithm() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x27, 0x01], &[0x67, 0x01, 0x11, 0x22]);
    let mut c = client(&sim, ClientConfig::default());
    assert!(matches!(
        c.unlock_security_access(0x01, None),
        Err(UdsError::Config { .. })
    ));
    // Zero seed means already unlocked, no algorithm needed
    sim.add_response(&[0x27, 0x01], &[0x67, 0x01, 0x00, 0x00]);
    assert!(c.unlock_security_access(0x01, None).unwrap().is_some());
    assert_eq!(sim.sent().len(), 2);
}

#[test]
fn read_data_by_identifier() {
    let sim = SimulationConnection::new();
    sim.add_response(
        &[0x22, 0xF1, 0x90, 0x01, 0x00],
        &[
            0x62, 0xF1, 0x90, b'W', b'D', b'B', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8',
            b'9', b'0', b'A', b'B', b'C', b'D', 0x01, 0x00, 0x12, 0x34,
        ],
    );
    let cfg = ClientConfig {
        data_identifiers: DidConfig::new()
            .with(0xF190, AsciiCodec::new(17))
            .with(0x0100, PackCodec::new(">H").unwrap()),
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    let r = c.read_data_by_identifier(&[0xF190, 0x0100]).unwrap().unwrap();
    let d = r.service_data::<ReadDataByIdentifierData>().unwrap();
    assert_eq!(d.get(0xF190), Some(&DidValue::Text("WDB1234567890ABCD".into())));
    assert_eq!(d.get(0x0100), Some(&DidValue::UInt(0x1234)));
}

#[test]
fn read_data_by_identifier_missing_value() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x22, 0x01, 0x00, 0x01, 0x01], &[0x62, 0x01, 0x00, 0x12, 0x34]);
    let cfg = ClientConfig {
        data_identifiers: DidConfig::new()
            .with(0x0100, PackCodec::new(">H").unwrap())
            .with(0x0101, PackCodec::new(">H").unwrap()),
        ..Default::default()
    };
    let mut c = client(&sim, cfg);
    assert!(matches!(
        c.read_data_by_identifier(&[0x0100, 0x0101]),
        Err(UdsError::UnexpectedResponse { .. })
    ));
}

#[test]
fn routine_id_echo() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x31, 0x01, 0x12, 0x34], &[0x71, 0x01, 0x12, 0x35]);
    sim.add_response(&[0x31, 0x03, 0x12, 0x34], &[0x71, 0x03, 0x12, 0x34, 0xAA]);
    let mut c = client(&sim, ClientConfig::default());
    assert!(matches!(
        c.start_routine(0x1234, None),
        Err(UdsError::UnexpectedResponse { .. })
    ));
    let r = c.get_routine_result(0x1234, None).unwrap().unwrap();
    assert_eq!(
        r.service_data::<RoutineControlData>().unwrap().routine_status_record,
        vec![0xAA]
    );
}

#[test]
fn read_dtc_by_status_mask() {
    let sim = SimulationConnection::new();
    sim.add_response(
        &[0x19, 0x02, 0xFF],
        &[0x59, 0x02, 0xFF, 0x12, 0x34, 0x56, 0x09, 0xAB, 0xCD, 0xEF, 0x08],
    );
    sim.add_response(&[0x19, 0x01, 0xFF], &[0x59, 0x01, 0xFF, 0x01, 0x00, 0x05]);
    let mut c = client(&sim, ClientConfig::default());

    let r = c.get_dtc_by_status_mask(0xFF).unwrap().unwrap();
    let d = r.service_data::<ReadDtcInformationData>().unwrap();
    assert_eq!(d.dtcs.len(), 2);
    assert_eq!(d.dtcs[0].id, 0x123456);
    assert_eq!(d.dtcs[0].status.get_byte(), 0x09);
    assert_eq!(d.dtcs[1].id, 0xABCDEF);

    let r = c.get_number_of_dtc_by_status_mask(0xFF).unwrap().unwrap();
    assert_eq!(r.service_data::<ReadDtcInformationData>().unwrap().count, Some(5));
}

#[test]
fn read_dtc_subfunction_echo() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x19, 0x02, 0xFF], &[0x59, 0x0A, 0xFF]);
    let mut c = client(&sim, ClientConfig::default());
    assert!(matches!(
        c.read_dtc_information(
            DtcReportType::ReportDtcByStatusMask,
            uds_client::uds::read_dtc_information::DtcRequestParams {
                status_mask: Some(0xFF),
                ..Default::default()
            }
        ),
        Err(UdsError::UnexpectedResponse { .. })
    ));
}

#[test]
fn suppressed_positive_response_waits_for_nrc() {
    let sim = SimulationConnection::new();
    sim.add_response(&[0x3E, 0x80], &[0x7F, 0x3E, 0x12]);
    let mut c = client(&sim, ClientConfig::default());
    {
        let mut guard = c.suppress_positive_response(true);
        assert!(matches!(guard.tester_present(), Err(UdsError::NegativeResponse(_))));
    }
    sim.add_response(&[0x3E, 0x80], &[0x7E, 0x00]);
    {
        let mut guard = c.suppress_positive_response(true);
        assert!(matches!(guard.tester_present(), Err(UdsError::UnexpectedResponse { .. })));
        sim.clear();
        assert!(guard.tester_present().unwrap().is_none());
    }
    assert_eq!(sim.sent(), vec![vec![0x3E, 0x80]]);
}
