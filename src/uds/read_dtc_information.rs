//! Provides methods to read and query DTCs on the ECU, as well as their snapshot
//! and extended data records

use crate::{
    ClientConfig, UdsClient, UdsError, UdsResult,
    channel::Connection,
    did::CodecLength,
    dtc::{Dtc, DtcFormat, DtcSeverity, DtcStatus, ExtendedData, Snapshot},
    read_be_uint,
    uds::{Request, Response, Service, check_echo, check_padding, require_len},
};

/// ReadDTCInformation sub-function definitions
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DtcReportType {
    /// Takes a status mask
    ReportNumberOfDtcByStatusMask = 0x01,
    /// Takes a status mask
    ReportDtcByStatusMask = 0x02,
    /// Takes no parameter
    ReportDtcSnapshotIdentification = 0x03,
    /// Takes a DTC and a snapshot record number
    ReportDtcSnapshotRecordByDtcNumber = 0x04,
    /// Takes a stored data record number
    ReportDtcStoredDataByRecordNumber = 0x05,
    /// Takes a DTC and an extended data record number
    ReportDtcExtDataRecordByDtcNumber = 0x06,
    /// Takes a severity mask and a status mask
    ReportNumberOfDtcBySeverityMaskRecord = 0x07,
    /// Takes a severity mask and a status mask
    ReportDtcBySeverityMaskRecord = 0x08,
    /// Takes a DTC
    ReportSeverityInformationOfDtc = 0x09,
    /// Takes no parameter
    ReportSupportedDtc = 0x0A,
    /// Takes no parameter
    ReportFirstTestFailedDtc = 0x0B,
    /// Takes no parameter
    ReportFirstConfirmedDtc = 0x0C,
    /// Takes no parameter
    ReportMostRecentTestFailedDtc = 0x0D,
    /// Takes no parameter
    ReportMostRecentConfirmedDtc = 0x0E,
    /// Takes a status mask
    ReportMirrorMemoryDtcByStatusMask = 0x0F,
    /// Takes a DTC and an extended data record number
    ReportMirrorMemoryDtcExtDataRecordByDtcNumber = 0x10,
    /// Takes a status mask
    ReportNumberOfMirrorMemoryDtcByStatusMask = 0x11,
    /// Takes a status mask
    ReportNumberOfEmissionsObdDtcByStatusMask = 0x12,
    /// Takes a status mask
    ReportEmissionsObdDtcByStatusMask = 0x13,
    /// Takes no parameter
    ReportDtcFaultDetectionCounter = 0x14,
    /// Takes no parameter
    ReportDtcWithPermanentStatus = 0x15,
    /// Takes an extended data record number (0x00 - 0xEF)
    ReportDtcExtDataRecordByRecordNumber = 0x16,
    /// Takes a status mask and a memory selection
    ReportUserDefMemoryDtcByStatusMask = 0x17,
    /// Takes a DTC, a snapshot record number and a memory selection
    ReportUserDefMemoryDtcSnapshotRecordByDtcNumber = 0x18,
    /// Takes a DTC, an extended data record number and a memory selection
    ReportUserDefMemoryDtcExtDataRecordByDtcNumber = 0x19,
    /// Takes an extended data record number
    ReportSupportedDtcExtDataRecord = 0x1A,
    /// Takes a functional group, a status mask and a severity mask
    ReportWwhObdDtcByMaskRecord = 0x42,
    /// Takes a functional group
    ReportWwhObdDtcWithPermanentStatus = 0x55,
    /// Takes a functional group and a readiness group
    ReportDtcInformationByDtcReadinessGroupIdentifier = 0x56,
}

impl From<DtcReportType> for u8 {
    fn from(t: DtcReportType) -> Self {
        t as u8
    }
}

impl DtcReportType {
    fn uses_memory_selection(&self) -> bool {
        matches!(
            self,
            Self::ReportUserDefMemoryDtcByStatusMask
                | Self::ReportUserDefMemoryDtcSnapshotRecordByDtcNumber
                | Self::ReportUserDefMemoryDtcExtDataRecordByDtcNumber
        )
    }

    fn echoes_dtc(&self) -> bool {
        matches!(
            self,
            Self::ReportDtcSnapshotRecordByDtcNumber
                | Self::ReportUserDefMemoryDtcSnapshotRecordByDtcNumber
                | Self::ReportDtcExtDataRecordByDtcNumber
                | Self::ReportMirrorMemoryDtcExtDataRecordByDtcNumber
                | Self::ReportUserDefMemoryDtcExtDataRecordByDtcNumber
        )
    }

    fn reads_extended_data_by_dtc(&self) -> bool {
        matches!(
            self,
            Self::ReportDtcExtDataRecordByDtcNumber
                | Self::ReportMirrorMemoryDtcExtDataRecordByDtcNumber
                | Self::ReportUserDefMemoryDtcExtDataRecordByDtcNumber
        )
    }

    fn uses_functional_group(&self) -> bool {
        matches!(
            self,
            Self::ReportWwhObdDtcByMaskRecord
                | Self::ReportWwhObdDtcWithPermanentStatus
                | Self::ReportDtcInformationByDtcReadinessGroupIdentifier
        )
    }
}

/// Parameters of a ReadDTCInformation request.
/// Which ones are needed depends on the [DtcReportType], the others are ignored
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DtcRequestParams {
    /// DTC status mask
    pub status_mask: Option<u8>,
    /// DTC severity mask
    pub severity_mask: Option<u8>,
    /// DTC number (24 bits)
    pub dtc: Option<u32>,
    /// Snapshot or stored data record number
    pub snapshot_record_number: Option<u8>,
    /// Extended data record number
    pub extended_record_number: Option<u8>,
    /// User defined DTC memory
    pub memory_selection: Option<u8>,
    /// WWH-OBD functional group identifier
    pub functional_group_id: Option<u8>,
    /// DTC readiness group identifier
    pub readiness_group: Option<u8>,
    /// Size of one extended data record. Overrides [ClientConfig::extended_data_size]
    pub extended_data_size: Option<usize>,
}

/// Decoded ReadDTCInformation response. Fields not part of the report type are None
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadDtcInformationData {
    /// Subfunction echoed by the server
    pub subfunction_echo: u8,
    /// Status bits supported by the server
    pub status_availability: Option<DtcStatus>,
    /// Severity bits supported by the server
    pub severity_availability: Option<DtcSeverity>,
    /// Format of the DTC numbers
    pub format: Option<DtcFormat>,
    /// Number of DTCs matching the request
    pub count: Option<u16>,
    /// DTCs in the order sent by the server. Duplicates are kept
    pub dtcs: Vec<Dtc>,
    /// Memory selection echoed by the server
    pub memory_selection_echo: Option<u8>,
    /// Functional group echoed by the server
    pub functional_group_id: Option<u8>,
    /// Readiness group echoed by the server
    pub readiness_group: Option<u8>,
    /// Extended data record number echoed by the server
    pub extended_record_number_echo: Option<u8>,
}

fn need<T>(value: Option<T>, name: &str, report_type: DtcReportType) -> UdsResult<T> {
    value.ok_or_else(|| {
        UdsError::InvalidParameter(format!("{name} is required for report type {report_type}"))
    })
}

fn dtc_bytes(params: &DtcRequestParams, report_type: DtcReportType) -> UdsResult<[u8; 3]> {
    let dtc = need(params.dtc, "dtc", report_type)?;
    if dtc > 0xFFFFFF {
        return Err(UdsError::InvalidParameter(format!(
            "dtc must be a valid 24 bit integer, got 0x{dtc:X}"
        )));
    }
    Ok(Dtc::new(dtc).id_bytes())
}

/// Builds a ReadDTCInformation request
pub fn make_request(report_type: DtcReportType, params: &DtcRequestParams) -> UdsResult<Request> {
    use DtcReportType as T;
    let rt = report_type;
    let mut data = Vec::new();
    match rt {
        T::ReportNumberOfDtcByStatusMask
        | T::ReportDtcByStatusMask
        | T::ReportMirrorMemoryDtcByStatusMask
        | T::ReportNumberOfMirrorMemoryDtcByStatusMask
        | T::ReportNumberOfEmissionsObdDtcByStatusMask
        | T::ReportEmissionsObdDtcByStatusMask => {
            data.push(need(params.status_mask, "status_mask", rt)?);
        }
        T::ReportNumberOfDtcBySeverityMaskRecord | T::ReportDtcBySeverityMaskRecord => {
            data.push(need(params.severity_mask, "severity_mask", rt)?);
            data.push(need(params.status_mask, "status_mask", rt)?);
        }
        T::ReportDtcSnapshotRecordByDtcNumber => {
            data.extend(dtc_bytes(params, rt)?);
            data.push(need(params.snapshot_record_number, "snapshot_record_number", rt)?);
        }
        T::ReportDtcStoredDataByRecordNumber => {
            data.push(need(params.snapshot_record_number, "snapshot_record_number", rt)?);
        }
        T::ReportDtcExtDataRecordByDtcNumber | T::ReportMirrorMemoryDtcExtDataRecordByDtcNumber => {
            data.extend(dtc_bytes(params, rt)?);
            data.push(need(params.extended_record_number, "extended_record_number", rt)?);
        }
        T::ReportSeverityInformationOfDtc => data.extend(dtc_bytes(params, rt)?),
        T::ReportDtcSnapshotIdentification
        | T::ReportSupportedDtc
        | T::ReportFirstTestFailedDtc
        | T::ReportFirstConfirmedDtc
        | T::ReportMostRecentTestFailedDtc
        | T::ReportMostRecentConfirmedDtc
        | T::ReportDtcFaultDetectionCounter
        | T::ReportDtcWithPermanentStatus => {}
        T::ReportDtcExtDataRecordByRecordNumber => {
            let record = need(params.extended_record_number, "extended_record_number", rt)?;
            if record > 0xEF {
                return Err(UdsError::InvalidParameter(format!(
                    "extended_record_number must be between 0x00 and 0xEF for report type {rt}, got 0x{record:02X}"
                )));
            }
            data.push(record);
        }
        T::ReportSupportedDtcExtDataRecord => {
            data.push(need(params.extended_record_number, "extended_record_number", rt)?);
        }
        T::ReportUserDefMemoryDtcByStatusMask => {
            data.push(need(params.status_mask, "status_mask", rt)?);
            data.push(need(params.memory_selection, "memory_selection", rt)?);
        }
        T::ReportUserDefMemoryDtcSnapshotRecordByDtcNumber => {
            data.extend(dtc_bytes(params, rt)?);
            data.push(need(params.snapshot_record_number, "snapshot_record_number", rt)?);
            data.push(need(params.memory_selection, "memory_selection", rt)?);
        }
        T::ReportUserDefMemoryDtcExtDataRecordByDtcNumber => {
            data.extend(dtc_bytes(params, rt)?);
            data.push(need(params.extended_record_number, "extended_record_number", rt)?);
            data.push(need(params.memory_selection, "memory_selection", rt)?);
        }
        T::ReportWwhObdDtcByMaskRecord => {
            data.push(need(params.functional_group_id, "functional_group_id", rt)?);
            data.push(need(params.status_mask, "status_mask", rt)?);
            data.push(need(params.severity_mask, "severity_mask", rt)?);
        }
        T::ReportWwhObdDtcWithPermanentStatus => {
            data.push(need(params.functional_group_id, "functional_group_id", rt)?);
        }
        T::ReportDtcInformationByDtcReadinessGroupIdentifier => {
            data.push(need(params.functional_group_id, "functional_group_id", rt)?);
            data.push(need(params.readiness_group, "readiness_group", rt)?);
        }
    }
    Request::new(Service::ReadDTCInformation, Some(rt.into()), data)
}

fn extended_data_size(config: &ClientConfig, given: Option<usize>, dtc: u32) -> UdsResult<usize> {
    given
        .or_else(|| config.extended_data_size.as_ref().and_then(|s| s.get(dtc)))
        .ok_or_else(|| {
            UdsError::config(
                None,
                format!(
                    "Extended data size of DTC 0x{dtc:06X} is unknown. Set extended_data_size in the configuration or in the request"
                ),
            )
        })
}

fn check_partial_record(response: &Response, rest: &[u8], tolerate_zero_padding: bool) -> UdsResult<()> {
    if rest.is_empty() || (tolerate_zero_padding && rest.iter().all(|b| *b == 0)) {
        Ok(())
    } else {
        Err(UdsError::invalid(
            response,
            format!("Incomplete DTC record. {} trailing bytes do not form a complete record", rest.len()),
        ))
    }
}

fn is_zero(b: &[u8]) -> bool {
    b.iter().all(|b| *b == 0)
}

/// Stops a record walk on an all zero remainder. Fails if padding is not tolerated
fn zero_tail(response: &Response, rest: &[u8], tolerate_zero_padding: bool) -> UdsResult<bool> {
    if !is_zero(rest) {
        return Ok(false);
    }
    check_partial_record(response, rest, tolerate_zero_padding)?;
    Ok(true)
}

/// Walks records of a fixed size
fn fixed_records<F>(
    response: &Response,
    data: &[u8],
    size: usize,
    config: &ClientConfig,
    f: F,
) -> UdsResult<Vec<Dtc>>
where
    F: Fn(&[u8]) -> Dtc,
{
    let mut chunks = data.chunks_exact(size);
    let records: Vec<&[u8]> = (&mut chunks).collect();
    check_partial_record(response, chunks.remainder(), config.tolerate_zero_padding)?;
    // Trailing zero records can't be told apart from padding
    if !config.tolerate_zero_padding && records.last().is_some_and(|c| is_zero(c)) {
        return Err(UdsError::invalid(
            response,
            "Response ends with an all zero record while zero padding is not tolerated",
        ));
    }
    Ok(records
        .into_iter()
        .filter(|c| !(config.ignore_all_zero_dtc && is_zero(c)))
        .map(f)
        .collect())
}

fn read_dtc(b: &[u8]) -> Dtc {
    Dtc::from_bytes(&[b[0], b[1], b[2]])
}

/// DTC + status records
fn status_records(response: &Response, data: &[u8], config: &ClientConfig) -> UdsResult<Vec<Dtc>> {
    fixed_records(response, data, 4, config, |c| {
        let mut dtc = read_dtc(c);
        dtc.status = DtcStatus::from_byte(c[3]);
        dtc
    })
}

/// Severity + functional unit + DTC + status records
fn severity_records(response: &Response, data: &[u8], config: &ClientConfig) -> UdsResult<Vec<Dtc>> {
    fixed_records(response, data, 6, config, |c| {
        let mut dtc = read_dtc(&c[2..]);
        dtc.severity = DtcSeverity::from_byte(c[0]);
        dtc.functional_unit = Some(c[1]);
        dtc.status = DtcStatus::from_byte(c[5]);
        dtc
    })
}

/// Merges entries of the same DTC and status, keeping the first position.
/// The same DTC reported with another status stays a separate entry
fn group_by_dtc(dtcs: Vec<Dtc>) -> Vec<Dtc> {
    let mut out: Vec<Dtc> = Vec::new();
    for dtc in dtcs {
        match out.iter_mut().find(|d| d.id == dtc.id && d.status == dtc.status) {
            Some(existing) => existing.snapshots.extend(dtc.snapshots),
            None => out.push(dtc),
        }
    }
    out
}

/// Reads one DID of a snapshot record. Returns the snapshot and the bytes used
fn snapshot_did(
    response: &Response,
    data: &[u8],
    record_number: u8,
    config: &ClientConfig,
) -> UdsResult<(Snapshot, usize)> {
    let width = config.dtc_snapshot_did_size;
    if data.len() < width {
        return Err(UdsError::invalid(
            response,
            format!("Incomplete response. Snapshot record 0x{record_number:02X} announces more data identifiers than it contains"),
        ));
    }
    let raw_did = read_be_uint(&data[..width], width)?;
    let did = u16::try_from(raw_did).map_err(|_| {
        UdsError::invalid(
            response,
            format!("Snapshot data identifier 0x{raw_did:X} does not fit in 16 bits"),
        )
    })?;
    let codec = config.data_identifiers.fetch(did)?;
    let len = match codec.length() {
        CodecLength::ReadAllRemaining => data.len() - width,
        CodecLength::Fixed(n) => n,
    };
    if data.len() < width + len {
        return Err(UdsError::invalid(
            response,
            format!("Incomplete response. Value of data identifier 0x{did:04X} in snapshot record 0x{record_number:02X} is truncated"),
        ));
    }
    let raw = &data[width..width + len];
    let value = codec.decode(raw).map_err(|e| {
        UdsError::invalid(
            response,
            format!("Cannot decode snapshot value of data identifier 0x{did:04X}: {e}"),
        )
    })?;
    Ok((
        Snapshot {
            record_number,
            did: Some(did),
            data: Some(value),
            raw_data: raw.to_vec(),
        },
        width + len,
    ))
}

/// Reads `count` DIDs of a snapshot record. Returns the snapshots and the bytes used
fn snapshot_dids(
    response: &Response,
    data: &[u8],
    record_number: u8,
    count: u8,
    config: &ClientConfig,
) -> UdsResult<(Vec<Snapshot>, usize)> {
    let mut snapshots = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for _ in 0..count {
        let (snapshot, used) = snapshot_did(response, &data[offset..], record_number, config)?;
        snapshots.push(snapshot);
        offset += used;
    }
    Ok((snapshots, offset))
}

/// Snapshot records following a DTC: (record number, number of DIDs, DIDs)*
fn snapshot_records(response: &Response, data: &[u8], config: &ClientConfig) -> UdsResult<Vec<Snapshot>> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        if zero_tail(response, rest, config.tolerate_zero_padding)? {
            break;
        }
        if rest.len() < 2 {
            check_partial_record(response, rest, config.tolerate_zero_padding)?;
            break;
        }
        let (snapshots, used) = snapshot_dids(response, &rest[2..], rest[0], rest[1], config)?;
        out.extend(snapshots);
        offset += 2 + used;
    }
    Ok(out)
}

/// Stored data records: (record number, DTC, status, number of DIDs, DIDs)*
fn stored_data_records(response: &Response, data: &[u8], config: &ClientConfig) -> UdsResult<Vec<Dtc>> {
    let mut dtcs = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        // A single trailing zero is always accepted
        if rest == [0] || zero_tail(response, rest, config.tolerate_zero_padding)? {
            break;
        }
        if rest.len() < 6 {
            check_partial_record(response, rest, config.tolerate_zero_padding)?;
            break;
        }
        let mut dtc = read_dtc(&rest[1..]);
        dtc.status = DtcStatus::from_byte(rest[4]);
        let (snapshots, used) = snapshot_dids(response, &rest[6..], rest[0], rest[5], config)?;
        offset += 6 + used;
        if config.ignore_all_zero_dtc && is_zero(&rest[1..5]) {
            continue;
        }
        dtc.snapshots = snapshots;
        dtcs.push(dtc);
    }
    Ok(group_by_dtc(dtcs))
}

/// Extended data records following a DTC: (record number, data)*
fn extended_records(
    response: &Response,
    data: &[u8],
    size: usize,
    tolerate_zero_padding: bool,
) -> UdsResult<Vec<ExtendedData>> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        if zero_tail(response, rest, tolerate_zero_padding)? {
            break;
        }
        if rest.len() < size + 1 {
            return Err(UdsError::invalid(
                response,
                format!("Incomplete extended data record. Expected {} bytes, got {}", size + 1, rest.len()),
            ));
        }
        out.push(ExtendedData {
            record_number: rest[0],
            raw_data: rest[1..=size].to_vec(),
        });
        offset += size + 1;
    }
    Ok(out)
}

/// Extended data by record number: (DTC, status, data)*
fn extended_by_record_number(
    response: &Response,
    data: &[u8],
    record_number: u8,
    config: &ClientConfig,
    given_size: Option<usize>,
) -> UdsResult<Vec<Dtc>> {
    let mut dtcs = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        if zero_tail(response, rest, config.tolerate_zero_padding)? {
            break;
        }
        if rest.len() < 4 {
            return Err(UdsError::invalid(response, "Incomplete DTC record"));
        }
        let mut dtc = read_dtc(rest);
        dtc.status = DtcStatus::from_byte(rest[3]);
        let size = extended_data_size(config, given_size, dtc.id)?;
        if rest.len() < 4 + size {
            return Err(UdsError::invalid(
                response,
                format!("Incomplete extended data record of DTC 0x{:06X}", dtc.id),
            ));
        }
        dtc.extended_data.push(ExtendedData {
            record_number,
            raw_data: rest[4..4 + size].to_vec(),
        });
        dtcs.push(dtc);
        offset += 4 + size;
    }
    Ok(dtcs)
}

fn parse(
    response: &Response,
    report_type: DtcReportType,
    config: &ClientConfig,
    given_size: Option<usize>,
) -> UdsResult<ReadDtcInformationData> {
    use DtcReportType as T;
    require_len(response, 1, "subfunction echo")?;
    let d = &response.data;
    let mut out = ReadDtcInformationData {
        subfunction_echo: d[0],
        ..Default::default()
    };
    match report_type {
        T::ReportNumberOfDtcByStatusMask
        | T::ReportNumberOfDtcBySeverityMaskRecord
        | T::ReportNumberOfMirrorMemoryDtcByStatusMask
        | T::ReportNumberOfEmissionsObdDtcByStatusMask => {
            require_len(response, 5, "status availability, format and count")?;
            out.status_availability = Some(DtcStatus::from_byte(d[1]));
            out.format = Some(DtcFormat::from(d[2]));
            out.count = Some(u16::from_be_bytes([d[3], d[4]]));
            check_padding(response, &d[5..], config.tolerate_zero_padding)?;
        }
        T::ReportDtcByStatusMask
        | T::ReportSupportedDtc
        | T::ReportFirstTestFailedDtc
        | T::ReportFirstConfirmedDtc
        | T::ReportMostRecentTestFailedDtc
        | T::ReportMostRecentConfirmedDtc
        | T::ReportMirrorMemoryDtcByStatusMask
        | T::ReportEmissionsObdDtcByStatusMask
        | T::ReportDtcWithPermanentStatus => {
            require_len(response, 2, "status availability")?;
            out.status_availability = Some(DtcStatus::from_byte(d[1]));
            out.dtcs = status_records(response, &d[2..], config)?;
        }
        T::ReportUserDefMemoryDtcByStatusMask => {
            require_len(response, 3, "memory selection and status availability")?;
            out.memory_selection_echo = Some(d[1]);
            out.status_availability = Some(DtcStatus::from_byte(d[2]));
            out.dtcs = status_records(response, &d[3..], config)?;
        }
        T::ReportDtcBySeverityMaskRecord | T::ReportSeverityInformationOfDtc => {
            require_len(response, 2, "status availability")?;
            out.status_availability = Some(DtcStatus::from_byte(d[1]));
            let mut records = &d[2..];
            if report_type == T::ReportSeverityInformationOfDtc && records.len() > 6 {
                records = &records[..6];
            }
            out.dtcs = severity_records(response, records, config)?;
        }
        T::ReportDtcFaultDetectionCounter => {
            out.dtcs = fixed_records(response, &d[1..], 4, config, |c| {
                let mut dtc = read_dtc(c);
                dtc.fault_counter = Some(c[3]);
                dtc
            })?;
        }
        T::ReportDtcSnapshotIdentification => {
            let dtcs = fixed_records(response, &d[1..], 4, config, |c| {
                let mut dtc = read_dtc(c);
                dtc.snapshots.push(Snapshot {
                    record_number: c[3],
                    did: None,
                    data: None,
                    raw_data: Vec::new(),
                });
                dtc
            })?;
            out.dtcs = group_by_dtc(dtcs);
        }
        T::ReportDtcSnapshotRecordByDtcNumber | T::ReportUserDefMemoryDtcSnapshotRecordByDtcNumber => {
            let start = if report_type.uses_memory_selection() {
                require_len(response, 2, "memory selection")?;
                out.memory_selection_echo = Some(d[1]);
                2
            } else {
                1
            };
            require_len(response, start + 4, "DTC and status")?;
            let mut dtc = read_dtc(&d[start..]);
            dtc.status = DtcStatus::from_byte(d[start + 3]);
            dtc.snapshots = snapshot_records(response, &d[start + 4..], config)?;
            out.dtcs = vec![dtc];
        }
        T::ReportDtcStoredDataByRecordNumber => {
            out.dtcs = stored_data_records(response, &d[1..], config)?;
        }
        T::ReportDtcExtDataRecordByDtcNumber
        | T::ReportMirrorMemoryDtcExtDataRecordByDtcNumber
        | T::ReportUserDefMemoryDtcExtDataRecordByDtcNumber => {
            let start = if report_type.uses_memory_selection() {
                require_len(response, 2, "memory selection")?;
                out.memory_selection_echo = Some(d[1]);
                2
            } else {
                1
            };
            require_len(response, start + 4, "DTC and status")?;
            let mut dtc = read_dtc(&d[start..]);
            dtc.status = DtcStatus::from_byte(d[start + 3]);
            let size = extended_data_size(config, given_size, dtc.id)?;
            dtc.extended_data =
                extended_records(response, &d[start + 4..], size, config.tolerate_zero_padding)?;
            out.dtcs = vec![dtc];
        }
        T::ReportDtcExtDataRecordByRecordNumber => {
            require_len(response, 2, "extended data record number")?;
            out.extended_record_number_echo = Some(d[1]);
            out.dtcs = extended_by_record_number(response, &d[2..], d[1], config, given_size)?;
        }
        T::ReportSupportedDtcExtDataRecord => {
            require_len(response, 2, "status availability")?;
            out.status_availability = Some(DtcStatus::from_byte(d[1]));
            if d.len() > 2 {
                out.extended_record_number_echo = Some(d[2]);
                out.dtcs = status_records(response, &d[3..], config)?;
            }
        }
        T::ReportWwhObdDtcByMaskRecord => {
            require_len(response, 5, "functional group, availability masks and format")?;
            out.functional_group_id = Some(d[1]);
            out.status_availability = Some(DtcStatus::from_byte(d[2]));
            out.severity_availability = Some(DtcSeverity::from_byte(d[3]));
            out.format = Some(DtcFormat::from(d[4]));
            out.dtcs = fixed_records(response, &d[5..], 5, config, |c| {
                let mut dtc = read_dtc(&c[1..]);
                dtc.severity = DtcSeverity::from_byte(c[0]);
                dtc.status = DtcStatus::from_byte(c[4]);
                dtc
            })?;
        }
        T::ReportWwhObdDtcWithPermanentStatus => {
            require_len(response, 4, "functional group, status availability and format")?;
            out.functional_group_id = Some(d[1]);
            out.status_availability = Some(DtcStatus::from_byte(d[2]));
            out.format = Some(DtcFormat::from(d[3]));
            out.dtcs = status_records(response, &d[4..], config)?;
        }
        T::ReportDtcInformationByDtcReadinessGroupIdentifier => {
            require_len(response, 5, "functional group, status availability, format and readiness group")?;
            out.functional_group_id = Some(d[1]);
            out.status_availability = Some(DtcStatus::from_byte(d[2]));
            out.format = Some(DtcFormat::from(d[3]));
            out.readiness_group = Some(d[4]);
            out.dtcs = status_records(response, &d[5..], config)?;
        }
    }
    Ok(out)
}

/// Decodes a ReadDTCInformation response of the given report type.
///
/// `extended_data_size` overrides [ClientConfig::extended_data_size] for the report types
/// reading extended data
pub fn interpret_response(
    response: &mut Response,
    report_type: DtcReportType,
    config: &ClientConfig,
    extended_data_size: Option<usize>,
) -> UdsResult<()> {
    let data = parse(response, report_type, config, extended_data_size)?;
    response.service_data = Some(data.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Reads DTC information. See [DtcReportType] for the parameters each report type takes
    pub fn read_dtc_information(
        &mut self,
        report_type: DtcReportType,
        params: DtcRequestParams,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let config = client.config().clone();
            let req = make_request(report_type, &params)?;
            if let (true, Some(dtc)) = (report_type.reads_extended_data_by_dtc(), params.dtc) {
                extended_data_size(&config, params.extended_data_size, dtc)?;
            }
            let Some(response) = client.send_request(&req)? else {
                return Ok(None);
            };
            let echo = response.data.first().copied();
            let mut response = check_echo(response, "subfunction", echo, u8::from(report_type))?;
            interpret_response(&mut response, report_type, &config, params.extended_data_size)?;

            let mut echoes: Vec<(&str, Option<u32>, u32)> = Vec::new();
            if let Some(d) = response.service_data::<ReadDtcInformationData>() {
                if let (true, Some(m)) = (report_type.uses_memory_selection(), params.memory_selection) {
                    echoes.push(("memory selection", d.memory_selection_echo.map(u32::from), m as u32));
                }
                if let (true, Some(dtc)) = (report_type.echoes_dtc(), params.dtc) {
                    echoes.push(("DTC", d.dtcs.first().map(|d| d.id), dtc));
                }
                if let (true, Some(g)) = (report_type.uses_functional_group(), params.functional_group_id) {
                    echoes.push(("functional group", d.functional_group_id.map(u32::from), g as u32));
                }
                if let Some(r) = params.readiness_group {
                    if report_type == DtcReportType::ReportDtcInformationByDtcReadinessGroupIdentifier {
                        echoes.push(("readiness group", d.readiness_group.map(u32::from), r as u32));
                    }
                }
                if let (Some(received), Some(r)) = (d.extended_record_number_echo, params.extended_record_number) {
                    echoes.push(("extended data record number", Some(received as u32), r as u32));
                }
            }
            for (name, received, expected) in echoes {
                response = check_echo(response, name, received, expected)?;
            }
            Ok(Some(response))
        })
    }

    fn dtc_report(&mut self, report_type: DtcReportType) -> UdsResult<Option<Response>> {
        self.read_dtc_information(report_type, DtcRequestParams::default())
    }

    fn dtc_report_by_status(&mut self, report_type: DtcReportType, status_mask: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            report_type,
            DtcRequestParams {
                status_mask: Some(status_mask),
                ..Default::default()
            },
        )
    }

    /// Number of DTCs matching a status mask
    pub fn get_number_of_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportNumberOfDtcByStatusMask, status_mask)
    }

    /// Number of mirror memory DTCs matching a status mask
    pub fn get_mirror_memory_number_of_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportNumberOfMirrorMemoryDtcByStatusMask, status_mask)
    }

    /// Number of emission related OBD DTCs matching a status mask
    pub fn get_number_of_emission_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportNumberOfEmissionsObdDtcByStatusMask, status_mask)
    }

    /// DTCs matching a status mask
    pub fn get_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportDtcByStatusMask, status_mask)
    }

    /// Mirror memory DTCs matching a status mask
    pub fn get_mirror_memory_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportMirrorMemoryDtcByStatusMask, status_mask)
    }

    /// Emission related OBD DTCs matching a status mask
    pub fn get_emission_dtc_by_status_mask(&mut self, status_mask: u8) -> UdsResult<Option<Response>> {
        self.dtc_report_by_status(DtcReportType::ReportEmissionsObdDtcByStatusMask, status_mask)
    }

    /// DTCs of a user defined memory matching a status mask
    pub fn get_user_defined_memory_dtc_by_status_mask(
        &mut self,
        status_mask: u8,
        memory_selection: u8,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportUserDefMemoryDtcByStatusMask,
            DtcRequestParams {
                status_mask: Some(status_mask),
                memory_selection: Some(memory_selection),
                ..Default::default()
            },
        )
    }

    /// Number of DTCs matching a status and a severity mask
    pub fn get_number_of_dtc_by_severity_mask(
        &mut self,
        status_mask: u8,
        severity_mask: u8,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportNumberOfDtcBySeverityMaskRecord,
            DtcRequestParams {
                status_mask: Some(status_mask),
                severity_mask: Some(severity_mask),
                ..Default::default()
            },
        )
    }

    /// DTCs matching a status and a severity mask, with their severity
    pub fn get_dtc_by_severity_mask(&mut self, status_mask: u8, severity_mask: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcBySeverityMaskRecord,
            DtcRequestParams {
                status_mask: Some(status_mask),
                severity_mask: Some(severity_mask),
                ..Default::default()
            },
        )
    }

    /// Severity of one DTC
    pub fn get_dtc_severity(&mut self, dtc: u32) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportSeverityInformationOfDtc,
            DtcRequestParams {
                dtc: Some(dtc),
                ..Default::default()
            },
        )
    }

    /// Snapshot record numbers of every DTC
    pub fn get_dtc_snapshot_identification(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportDtcSnapshotIdentification)
    }

    /// Snapshot records of a DTC. Record number 0xFF reads every record
    pub fn get_dtc_snapshot_by_dtc_number(&mut self, dtc: u32, record_number: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcSnapshotRecordByDtcNumber,
            DtcRequestParams {
                dtc: Some(dtc),
                snapshot_record_number: Some(record_number),
                ..Default::default()
            },
        )
    }

    /// Snapshot records of a DTC in a user defined memory
    pub fn get_user_defined_memory_dtc_snapshot_by_dtc_number(
        &mut self,
        dtc: u32,
        record_number: u8,
        memory_selection: u8,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportUserDefMemoryDtcSnapshotRecordByDtcNumber,
            DtcRequestParams {
                dtc: Some(dtc),
                snapshot_record_number: Some(record_number),
                memory_selection: Some(memory_selection),
                ..Default::default()
            },
        )
    }

    /// Stored data records by record number
    pub fn get_dtc_snapshot_by_record_number(&mut self, record_number: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcStoredDataByRecordNumber,
            DtcRequestParams {
                snapshot_record_number: Some(record_number),
                ..Default::default()
            },
        )
    }

    /// Extended data records of a DTC.
    /// `data_size` overrides [ClientConfig::extended_data_size]
    pub fn get_dtc_extended_data_by_dtc_number(
        &mut self,
        dtc: u32,
        record_number: u8,
        data_size: Option<usize>,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcExtDataRecordByDtcNumber,
            DtcRequestParams {
                dtc: Some(dtc),
                extended_record_number: Some(record_number),
                extended_data_size: data_size,
                ..Default::default()
            },
        )
    }

    /// Extended data records of a mirror memory DTC
    pub fn get_mirror_memory_dtc_extended_data_by_dtc_number(
        &mut self,
        dtc: u32,
        record_number: u8,
        data_size: Option<usize>,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportMirrorMemoryDtcExtDataRecordByDtcNumber,
            DtcRequestParams {
                dtc: Some(dtc),
                extended_record_number: Some(record_number),
                extended_data_size: data_size,
                ..Default::default()
            },
        )
    }

    /// Extended data records of a DTC in a user defined memory
    pub fn get_user_defined_memory_dtc_extended_data_by_dtc_number(
        &mut self,
        dtc: u32,
        record_number: u8,
        memory_selection: u8,
        data_size: Option<usize>,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportUserDefMemoryDtcExtDataRecordByDtcNumber,
            DtcRequestParams {
                dtc: Some(dtc),
                extended_record_number: Some(record_number),
                memory_selection: Some(memory_selection),
                extended_data_size: data_size,
                ..Default::default()
            },
        )
    }

    /// One extended data record of every DTC holding it
    pub fn get_dtc_extended_data_by_record_number(
        &mut self,
        record_number: u8,
        data_size: Option<usize>,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcExtDataRecordByRecordNumber,
            DtcRequestParams {
                extended_record_number: Some(record_number),
                extended_data_size: data_size,
                ..Default::default()
            },
        )
    }

    /// DTCs supporting an extended data record
    pub fn get_supported_dtc_extended_data(&mut self, record_number: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportSupportedDtcExtDataRecord,
            DtcRequestParams {
                extended_record_number: Some(record_number),
                ..Default::default()
            },
        )
    }

    /// Every DTC supported by the server
    pub fn get_supported_dtc(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportSupportedDtc)
    }

    /// First DTC that failed a test
    pub fn get_first_test_failed_dtc(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportFirstTestFailedDtc)
    }

    /// First confirmed DTC
    pub fn get_first_confirmed_dtc(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportFirstConfirmedDtc)
    }

    /// Most recent DTC that failed a test
    pub fn get_most_recent_test_failed_dtc(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportMostRecentTestFailedDtc)
    }

    /// Most recent confirmed DTC
    pub fn get_most_recent_confirmed_dtc(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportMostRecentConfirmedDtc)
    }

    /// Fault detection counter of every DTC
    pub fn get_dtc_fault_counter(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportDtcFaultDetectionCounter)
    }

    /// DTCs with a permanent status
    pub fn get_dtc_with_permanent_status(&mut self) -> UdsResult<Option<Response>> {
        self.dtc_report(DtcReportType::ReportDtcWithPermanentStatus)
    }

    /// WWH-OBD DTCs of a functional group matching a status and a severity mask
    pub fn get_wwh_obd_dtc_by_mask_record(
        &mut self,
        functional_group_id: u8,
        status_mask: u8,
        severity_mask: u8,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportWwhObdDtcByMaskRecord,
            DtcRequestParams {
                functional_group_id: Some(functional_group_id),
                status_mask: Some(status_mask),
                severity_mask: Some(severity_mask),
                ..Default::default()
            },
        )
    }

    /// WWH-OBD DTCs of a functional group with a permanent status
    pub fn get_wwh_obd_dtc_with_permanent_status(&mut self, functional_group_id: u8) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportWwhObdDtcWithPermanentStatus,
            DtcRequestParams {
                functional_group_id: Some(functional_group_id),
                ..Default::default()
            },
        )
    }

    /// DTCs of a readiness group
    pub fn get_dtc_by_readiness_group(
        &mut self,
        functional_group_id: u8,
        readiness_group: u8,
    ) -> UdsResult<Option<Response>> {
        self.read_dtc_information(
            DtcReportType::ReportDtcInformationByDtcReadinessGroupIdentifier,
            DtcRequestParams {
                functional_group_id: Some(functional_group_id),
                readiness_group: Some(readiness_group),
                ..Default::default()
            },
        )
    }
}
