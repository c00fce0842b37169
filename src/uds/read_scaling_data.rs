//! Functions and data for the ReadScalingDataByIdentifier UDS service

use crate::{
    UdsClient, UdsError, UdsResult,
    channel::Connection,
    uds::{Request, Response, Service, check_echo, require_len},
};

/// Data type of a scaling byte (High nibble)
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::FromRepr, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ScalingType {
    /// Unsigned numeric integer
    UnsignedNumeric = 0x0,
    /// Signed numeric integer
    SignedNumeric = 0x1,
    /// Bit mapped, without mask
    BitMappedReportedWithOutMask = 0x2,
    /// Bit mapped, with mask
    BitMappedReportedWithMask = 0x3,
    /// Binary coded decimal
    BinaryCodedDecimal = 0x4,
    /// State encoded variable
    StateEncodedVariable = 0x5,
    /// ASCII text
    Ascii = 0x6,
    /// Signed floating point
    SignedFloatingPoint = 0x7,
    /// Packet
    Packet = 0x8,
    /// Formula. The extension holds the formula and its constants
    Formula = 0x9,
    /// Unit or format
    UnitFormat = 0xA,
    /// State and connection type (IO control)
    StateAndConnectionType = 0xB,
}

/// Conversion formula decoded from a formula scaling byte extension
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalingFormula {
    /// Formula identifier
    pub formula_id: u8,
    /// Constants C0, C1, ...
    pub constants: Vec<f64>,
}

impl ScalingFormula {
    /// Decodes a formula from a scaling byte extension.
    ///
    /// Each constant is 2 bytes: a 4 bit signed exponent E and a 12 bit signed mantissa M.
    /// C = M * 10^E
    pub fn from_extension(ext: &[u8]) -> Option<Self> {
        let (formula_id, rest) = ext.split_first()?;
        if rest.len() % 2 != 0 {
            return None;
        }
        let constants = rest
            .chunks_exact(2)
            .map(|c| decode_constant(u16::from_be_bytes([c[0], c[1]])))
            .collect();
        Some(Self {
            formula_id: *formula_id,
            constants,
        })
    }

    /// Converts a raw value with the formula.
    /// Vehicle manufacturer specific or reserved formulas, and formulas missing a
    /// constant return None
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let c = |i: usize| self.constants.get(i).copied();
        match self.formula_id {
            0x00 => Some(c(0)? * x + c(1)?),
            0x01 => Some(c(0)? * (x + c(1)?)),
            0x02 => Some(c(0)? / (x + c(1)?) + c(2)?),
            0x03 => Some(x / (c(0)? + c(1)?)),
            0x04 => Some((x + c(0)?) / c(1)?),
            0x05 => Some((x + c(0)?) / c(1)? + c(2)?),
            0x06 => Some(c(0)? * x),
            0x07 => Some(x / c(0)?),
            0x08 => Some(x + c(0)?),
            0x09 => Some(x * c(0)? / c(1)?),
            _ => None,
        }
    }
}

fn decode_constant(raw: u16) -> f64 {
    // Sign extend both fields
    let exponent = ((raw >> 12) as i8) << 4 >> 4;
    let mantissa = ((raw << 4) as i16) >> 4;
    mantissa as f64 * 10f64.powi(exponent as i32)
}

/// A scaling byte and its extension bytes
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalingByte {
    /// Raw scaling byte
    pub raw: u8,
    /// Extension bytes. Their count is the low nibble of the scaling byte
    pub extension: Vec<u8>,
}

impl ScalingByte {
    /// Data type of the scaling byte. None for reserved types
    pub fn scaling_type(&self) -> Option<ScalingType> {
        ScalingType::from_repr(self.raw >> 4)
    }

    /// Formula of a formula scaling byte
    pub fn formula(&self) -> Option<ScalingFormula> {
        match self.scaling_type() {
            Some(ScalingType::Formula) => ScalingFormula::from_extension(&self.extension),
            _ => None,
        }
    }
}

/// Decoded ReadScalingDataByIdentifier response
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingData {
    /// DID echoed by the server
    pub did_echo: u16,
    /// Scaling bytes, in order
    pub scaling_bytes: Vec<ScalingByte>,
}

/// Builds a ReadScalingDataByIdentifier request
pub fn make_request(did: u16) -> UdsResult<Request> {
    Request::new(
        Service::ReadScalingDataByIdentifier,
        None,
        did.to_be_bytes().to_vec(),
    )
}

/// Decodes a ReadScalingDataByIdentifier response
pub fn interpret_response(response: &mut Response) -> UdsResult<()> {
    require_len(response, 3, "DID echo and at least one scaling byte")?;
    let did_echo = u16::from_be_bytes([response.data[0], response.data[1]]);
    let mut scaling_bytes = Vec::new();
    let mut offset = 2;
    while offset < response.data.len() {
        let raw = response.data[offset];
        let ext_len = (raw & 0x0F) as usize;
        offset += 1;
        let Some(extension) = response.data.get(offset..offset + ext_len) else {
            return Err(UdsError::invalid(
                response,
                format!("Scaling byte 0x{raw:02X} announces {ext_len} extension bytes but the response is too short"),
            ));
        };
        if raw >> 4 == ScalingType::Formula as u8 && ScalingFormula::from_extension(extension).is_none() {
            return Err(UdsError::invalid(
                response,
                "Formula scaling byte extension is malformed",
            ));
        }
        scaling_bytes.push(ScalingByte {
            raw,
            extension: extension.to_vec(),
        });
        offset += ext_len;
    }
    response.service_data = Some(
        ScalingData {
            did_echo,
            scaling_bytes,
        }
        .into(),
    );
    Ok(())
}

impl<C: Connection> UdsClient<C> {
    /// Reads the scaling information of a data identifier
    pub fn read_scaling_data_by_identifier(&mut self, did: u16) -> UdsResult<Option<Response>> {
        self.handle_errors(|client| {
            let req = make_request(did)?;
            let Some(mut response) = client.send_request(&req)? else {
                return Ok(None);
            };
            interpret_response(&mut response)?;
            let echo = response.service_data::<ScalingData>().map(|d| d.did_echo);
            check_echo(response, "data identifier", echo, did).map(Some)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constants() {
        // E = 0, M = 5
        assert_eq!(decode_constant(0x0005), 5.0);
        // E = -1, M = 25
        assert!((decode_constant(0xF019) - 2.5).abs() < 1e-9);
        // E = 2, M = -1
        assert_eq!(decode_constant(0x2FFF), -100.0);
    }

    #[test]
    fn formulas() {
        let f = ScalingFormula {
            formula_id: 0,
            constants: vec![2.0, 3.0],
        };
        assert_eq!(f.evaluate(10.0), Some(23.0));
        let f = ScalingFormula {
            formula_id: 5,
            constants: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(f.evaluate(5.0), Some(6.0));
        let f = ScalingFormula {
            formula_id: 9,
            constants: vec![4.0],
        };
        assert_eq!(f.evaluate(5.0), None);
        let f = ScalingFormula {
            formula_id: 0x7F,
            constants: vec![1.0],
        };
        assert_eq!(f.evaluate(5.0), None);
    }

    #[test]
    fn response() {
        let mut r = Response::from_payload(&[
            0x64, 0x01, 0x02, 0x01, 0x45, 0x95, 0x00, 0x00, 0x02, 0x00, 0x03, 0x10,
        ]);
        interpret_response(&mut r).unwrap();
        let d = r.service_data::<ScalingData>().unwrap();
        assert_eq!(d.did_echo, 0x0102);
        assert_eq!(d.scaling_bytes.len(), 3);
        assert_eq!(d.scaling_bytes[0].scaling_type(), Some(ScalingType::UnsignedNumeric));
        assert_eq!(d.scaling_bytes[0].extension, vec![0x45]);
        let f = d.scaling_bytes[1].formula().unwrap();
        assert_eq!(f.constants, vec![2.0, 3.0]);
        assert_eq!(f.evaluate(1.0), Some(5.0));
        assert_eq!(d.scaling_bytes[2].scaling_type(), Some(ScalingType::SignedNumeric));
    }

    #[test]
    fn truncated() {
        let mut r = Response::from_payload(&[0x64, 0x01, 0x02, 0x03, 0x45]);
        assert!(matches!(
            interpret_response(&mut r),
            Err(UdsError::InvalidResponse { .. })
        ));
        let mut r = Response::from_payload(&[0x64, 0x01, 0x02]);
        assert!(interpret_response(&mut r).is_err());
    }
}
