//! Provides methods to add, delete, replace, read and resume files and to read
//! directories on the ECU file system

use crate::{
    StandardVersion, UdsClient, UdsError, UdsResult,
    channel::Connection,
    memory::DataFormatIdentifier,
    min_byte_width, read_be_uint,
    uds::{Request, Response, Service, check_echo, check_padding, require_len, require_version},
    write_be_uint,
};

/// File transfer mode of operation (MOOP)
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ModeOfOperation {
    /// Adds a file
    AddFile = 0x01,
    /// Deletes a file
    DeleteFile = 0x02,
    /// Replaces a file
    ReplaceFile = 0x03,
    /// Reads a file
    ReadFile = 0x04,
    /// Reads a directory
    ReadDir = 0x05,
    /// Resumes an interrupted transfer. Requires standard version 2020
    ResumeFile = 0x06,
}

impl From<ModeOfOperation> for u8 {
    fn from(m: ModeOfOperation) -> Self {
        m as u8
    }
}

impl ModeOfOperation {
    fn needs_file_size(&self) -> bool {
        matches!(self, Self::AddFile | Self::ReplaceFile | Self::ResumeFile)
    }

    fn takes_dfi(&self) -> bool {
        !matches!(self, Self::DeleteFile | Self::ReadDir)
    }
}

/// Size of a file to transfer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileSize {
    /// Size once uncompressed
    pub uncompressed: u64,
    /// Size as transferred
    pub compressed: u64,
    /// Number of bytes used to encode each size. Defaults to the smallest width holding both
    pub width: Option<u8>,
}

impl FileSize {
    /// Creates a file size with an automatic width
    pub fn new(uncompressed: u64, compressed: u64) -> Self {
        Self {
            uncompressed,
            compressed,
            width: None,
        }
    }

    /// Same size compressed and uncompressed
    pub fn uncompressed(size: u64) -> Self {
        Self::new(size, size)
    }

    fn encoded_width(&self) -> UdsResult<usize> {
        let needed = min_byte_width(self.uncompressed.max(self.compressed));
        match self.width {
            None => Ok(needed),
            Some(w) if (w as usize) < needed || w == 0 || w > 8 => Err(UdsError::InvalidParameter(
                format!("File size width of {w} bytes cannot hold the file size"),
            )),
            Some(w) => Ok(w as usize),
        }
    }
}

/// Decoded RequestFileTransfer response. Fields not part of the mode of operation are None
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferData {
    /// Mode of operation echoed by the server
    pub moop_echo: u8,
    /// Maximum length of a TransferData request
    pub max_length: Option<u64>,
    /// Data format of the transfer
    pub dfi: Option<DataFormatIdentifier>,
    /// Uncompressed size of a read file
    pub file_size_uncompressed: Option<u64>,
    /// Compressed size of a read file
    pub file_size_compressed: Option<u64>,
    /// Length of the directory information of a read directory
    pub dir_info_length: Option<u64>,
    /// Position to resume the transfer at
    pub file_position: Option<u64>,
}

/// Builds a RequestFileTransfer request.
///
/// ## Parameters
/// * moop - Mode of operation
/// * path - ASCII path of the file or directory
/// * dfi - Data format. Defaults to no compression and no encryption. Rejected for DeleteFile and ReadDir
/// * file_size - Required for AddFile, ReplaceFile and ResumeFile, rejected otherwise
/// * version - Standard version in use
pub fn make_request(
    moop: ModeOfOperation,
    path: &str,
    dfi: Option<DataFormatIdentifier>,
    file_size: Option<FileSize>,
    version: StandardVersion,
) -> UdsResult<Request> {
    if moop == ModeOfOperation::ResumeFile {
        require_version(version, StandardVersion::V2020, "ResumeFile")?;
    }
    if path.is_empty() || !path.is_ascii() {
        return Err(UdsError::InvalidParameter(
            "path must be a non empty ASCII string".into(),
        ));
    }
    let path_len = u16::try_from(path.len()).map_err(|_| {
        UdsError::InvalidParameter(format!("path is too long ({} bytes)", path.len()))
    })?;
    if !moop.takes_dfi() && dfi.is_some() {
        return Err(UdsError::InvalidParameter(format!(
            "A data format identifier cannot be given for {moop}"
        )));
    }
    let mut data = vec![moop.into()];
    data.extend_from_slice(&path_len.to_be_bytes());
    data.extend_from_slice(path.as_bytes());
    if moop.takes_dfi() {
        data.push(dfi.unwrap_or_default().get_byte());
    }
    match (moop.needs_file_size(), file_size) {
        (true, Some(size)) => {
            let width = size.encoded_width()?;
            data.push(width as u8);
            data.extend(write_be_uint(size.uncompressed, width));
            data.extend(write_be_uint(size.compressed, width));
        }
        (true, None) => {
            return Err(UdsError::InvalidParameter(format!(
                "A file size must be given for {moop}"
            )));
        }
        (false, Some(_)) => {
            return Err(UdsError::InvalidParameter(format!(
                "A file size cannot be given for {moop}"
            )));
        }
        (false, None) => {}
    }
    Request::new(Service::RequestFileTransfer, None, data)
}

/// Reads a length prefixed number. Returns the value and the bytes used
fn read_sized(response: &Response, offset: usize, prefix: usize, what: &str) -> UdsResult<(usize, usize)> {
    let d = &response.data;
    if d.len() < offset + prefix {
        return Err(UdsError::invalid(response, format!("Response is missing the length of the {what}")));
    }
    let width = read_be_uint(&d[offset..offset + prefix], prefix)? as usize;
    if width > 8 {
        return Err(UdsError::NotImplemented(format!(
            "This client does not support number bigger than 64 bits, but the server announced a {what} of {width} bytes"
        )));
    }
    if d.len() < offset + prefix + width {
        return Err(UdsError::invalid(response, format!("Response is missing the {what}")));
    }
    Ok((width, prefix))
}

/// Decodes a RequestFileTransfer response for the mode of operation that was requested
pub fn interpret_response(
    response: &mut Response,
    moop: ModeOfOperation,
    tolerate_zero_padding: bool,
) -> UdsResult<()> {
    require_len(response, 1, "mode of operation echo")?;
    let mut out = FileTransferData {
        moop_echo: response.data[0],
        max_length: None,
        dfi: None,
        file_size_uncompressed: None,
        file_size_compressed: None,
        dir_info_length: None,
        file_position: None,
    };
    let mut offset = 1;
    if moop != ModeOfOperation::DeleteFile {
        let (width, prefix) = read_sized(response, offset, 1, "max number of block length")?;
        offset += prefix;
        out.max_length = Some(read_be_uint(&response.data[offset..offset + width], width)?);
        offset += width;
        require_len(response, offset + 1, "data format identifier")?;
        out.dfi = Some(DataFormatIdentifier::from_byte(response.data[offset]));
        offset += 1;
    }
    if matches!(moop, ModeOfOperation::ReadFile | ModeOfOperation::ReadDir) {
        let what = if moop == ModeOfOperation::ReadFile { "file size" } else { "directory info length" };
        let (width, prefix) = read_sized(response, offset, 2, what)?;
        offset += prefix;
        let first = read_be_uint(&response.data[offset..offset + width], width)?;
        offset += width;
        if moop == ModeOfOperation::ReadFile {
            out.file_size_uncompressed = Some(first);
            if response.data.len() < offset + width {
                return Err(UdsError::invalid(response, "Response is missing the compressed file size"));
            }
            out.file_size_compressed = Some(read_be_uint(&response.data[offset..offset + width], width)?);
            offset += width;
        } else {
            out.dir_info_length = Some(first);
        }
    }
    if moop == ModeOfOperation::ResumeFile {
        if response.data.len() < offset + 8 {
            return Err(UdsError::invalid(response, "Response is missing the file position"));
        }
        out.file_position = Some(read_be_uint(&response.data[offset..offset + 8], 8)?);
        offset += 8;
    }
    check_padding(response, &response.data[offset..], tolerate_zero_padding)?;
    response.service_data = Some(out.into());
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Sends a RequestFileTransfer request. See [make_request]
    pub fn request_file_transfer(
        &mut self,
        moop: ModeOfOperation,
        path: &str,
        dfi: Option<DataFormatIdentifier>,
        file_size: Option<FileSize>,
    ) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let version = client.config().standard_version;
            let tolerate = client.config().tolerate_zero_padding;
            let req = make_request(moop, path, dfi, file_size, version)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response, moop, tolerate)?;
            let echo = response.service_data::<FileTransferData>().map(|d| d.moop_echo);
            check_echo(response, "mode of operation", echo, u8::from(moop)).map(Some)
        })
    }

    /// Adds a file
    pub fn add_file(
        &mut self,
        path: &str,
        dfi: Option<DataFormatIdentifier>,
        file_size: FileSize,
    ) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::AddFile, path, dfi, Some(file_size))
    }

    /// Deletes a file
    pub fn delete_file(&mut self, path: &str) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::DeleteFile, path, None, None)
    }

    /// Replaces a file
    pub fn replace_file(
        &mut self,
        path: &str,
        dfi: Option<DataFormatIdentifier>,
        file_size: FileSize,
    ) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::ReplaceFile, path, dfi, Some(file_size))
    }

    /// Reads a file
    pub fn read_file(&mut self, path: &str, dfi: Option<DataFormatIdentifier>) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::ReadFile, path, dfi, None)
    }

    /// Reads a directory
    pub fn read_dir(&mut self, path: &str) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::ReadDir, path, None, None)
    }

    /// Resumes a file transfer
    pub fn resume_file(
        &mut self,
        path: &str,
        dfi: Option<DataFormatIdentifier>,
        file_size: FileSize,
    ) -> UdsResult<Option<Response>> {
        self.request_file_transfer(ModeOfOperation::ResumeFile, path, dfi, Some(file_size))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const V2020: StandardVersion = StandardVersion::V2020;

    #[test]
    fn add_file() {
        let dfi = DataFormatIdentifier::new(3, 2).unwrap();
        let req = make_request(
            ModeOfOperation::AddFile,
            "my_file.txt",
            Some(dfi),
            Some(FileSize::new(0x1111, 0x2222)),
            V2020,
        )
        .unwrap();
        let mut expected = vec![0x38, 0x01, 0x00, 0x0B];
        expected.extend_from_slice(b"my_file.txt");
        expected.extend_from_slice(&[0x32, 0x02, 0x11, 0x11, 0x22, 0x22]);
        assert_eq!(req.get_payload(), expected);
    }

    #[test]
    fn request_rules() {
        assert!(make_request(ModeOfOperation::AddFile, "f", None, None, V2020).is_err());
        assert!(
            make_request(ModeOfOperation::ReadFile, "f", None, Some(FileSize::uncompressed(1)), V2020).is_err()
        );
        assert!(
            make_request(ModeOfOperation::DeleteFile, "f", Some(DataFormatIdentifier::default()), None, V2020)
                .is_err()
        );
        assert!(matches!(
            make_request(
                ModeOfOperation::ResumeFile,
                "f",
                None,
                Some(FileSize::uncompressed(1)),
                StandardVersion::V2013
            ),
            Err(UdsError::NotImplemented(_))
        ));
        let size = FileSize {
            width: Some(1),
            ..FileSize::new(0x1234, 0x10)
        };
        assert!(make_request(ModeOfOperation::AddFile, "f", None, Some(size), V2020).is_err());
        assert_eq!(
            make_request(ModeOfOperation::ReadDir, "d", None, None, V2020)
                .unwrap()
                .get_payload(),
            vec![0x38, 0x05, 0x00, 0x01, b'd']
        );
    }

    #[test]
    fn responses() {
        let mut r = Response::from_payload(&[0x78, 0x02]);
        interpret_response(&mut r, ModeOfOperation::DeleteFile, false).unwrap();

        let mut r = Response::from_payload(&[0x78, 0x01, 0x02, 0x0F, 0xFF, 0x00]);
        interpret_response(&mut r, ModeOfOperation::AddFile, false).unwrap();
        assert_eq!(r.service_data::<FileTransferData>().unwrap().max_length, Some(0xFFF));

        let mut r = Response::from_payload(&[
            0x78, 0x04, 0x01, 0x80, 0x12, 0x00, 0x02, 0x01, 0x00, 0x00, 0x80,
        ]);
        interpret_response(&mut r, ModeOfOperation::ReadFile, false).unwrap();
        let d = r.service_data::<FileTransferData>().unwrap();
        assert_eq!(d.dfi, Some(DataFormatIdentifier::new(1, 2).unwrap()));
        assert_eq!(d.file_size_uncompressed, Some(0x100));
        assert_eq!(d.file_size_compressed, Some(0x80));

        let mut r = Response::from_payload(&[0x78, 0x05, 0x01, 0x80, 0x00, 0x00, 0x01, 0x33]);
        interpret_response(&mut r, ModeOfOperation::ReadDir, false).unwrap();
        assert_eq!(r.service_data::<FileTransferData>().unwrap().dir_info_length, Some(0x33));

        let mut r = Response::from_payload(&[
            0x78, 0x06, 0x01, 0x80, 0x00, 0, 0, 0, 0, 0, 0, 0x12, 0x34,
        ]);
        interpret_response(&mut r, ModeOfOperation::ResumeFile, false).unwrap();
        assert_eq!(r.service_data::<FileTransferData>().unwrap().file_position, Some(0x1234));
    }

    #[test]
    fn padding_and_limits() {
        let payload = [0x78, 0x02, 0x00, 0x00];
        let mut r = Response::from_payload(&payload);
        interpret_response(&mut r, ModeOfOperation::DeleteFile, true).unwrap();
        let mut r = Response::from_payload(&payload);
        assert!(interpret_response(&mut r, ModeOfOperation::DeleteFile, false).is_err());

        let mut r = Response::from_payload(&[0x78, 0x01, 0x09, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert!(matches!(
            interpret_response(&mut r, ModeOfOperation::AddFile, false),
            Err(UdsError::NotImplemented(_))
        ));
    }
}
