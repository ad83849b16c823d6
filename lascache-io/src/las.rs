//! LAS public header block codec
//!
//! Decodes the fixed little-endian LAS 1.x public header block into a
//! [`LasHeader`]. Field positions are kept in one declarative offset table
//! that drives decoding, encoding and validation alike, so the layout can
//! be unit-tested without touching any real file.
//!
//! Layout reference: ASPRS LAS 1.2 specification, public header block.

use crate::error::DecodeError;
use lascache_core::Vector3d;
use log::debug;
use serde::{Deserialize, Serialize};

/// Size of the LAS 1.2 public header block in bytes.
pub const HEADER_SIZE: usize = 227;

/// Smallest point record that still carries the three XYZ i32 fields.
pub const MIN_RECORD_LENGTH: u16 = 12;

const FILE_SIGNATURE: &[u8; 4] = b"LASF";

/// One fixed-position field in the public header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldSpec {
    pub offset: usize,
    pub width: usize,
}

impl FieldSpec {
    const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }
}

pub(crate) const VERSION_MAJOR: FieldSpec = FieldSpec::new(24, 1);
pub(crate) const VERSION_MINOR: FieldSpec = FieldSpec::new(25, 1);
pub(crate) const HEADER_SIZE_FIELD: FieldSpec = FieldSpec::new(94, 2);
pub(crate) const OFFSET_TO_POINT_DATA: FieldSpec = FieldSpec::new(96, 4);
pub(crate) const POINT_DATA_FORMAT: FieldSpec = FieldSpec::new(104, 1);
pub(crate) const POINT_DATA_RECORD_LENGTH: FieldSpec = FieldSpec::new(105, 2);
pub(crate) const NUMBER_OF_POINT_RECORDS: FieldSpec = FieldSpec::new(107, 4);
pub(crate) const X_SCALE_FACTOR: FieldSpec = FieldSpec::new(131, 8);
pub(crate) const Y_SCALE_FACTOR: FieldSpec = FieldSpec::new(139, 8);
pub(crate) const Z_SCALE_FACTOR: FieldSpec = FieldSpec::new(147, 8);
pub(crate) const X_OFFSET: FieldSpec = FieldSpec::new(155, 8);
pub(crate) const Y_OFFSET: FieldSpec = FieldSpec::new(163, 8);
pub(crate) const Z_OFFSET: FieldSpec = FieldSpec::new(171, 8);

/// All decoded fields, in layout order. Drives the layout sanity test.
#[cfg(test)]
const FIELDS: &[FieldSpec] = &[
    VERSION_MAJOR,
    VERSION_MINOR,
    HEADER_SIZE_FIELD,
    OFFSET_TO_POINT_DATA,
    POINT_DATA_FORMAT,
    POINT_DATA_RECORD_LENGTH,
    NUMBER_OF_POINT_RECORDS,
    X_SCALE_FACTOR,
    Y_SCALE_FACTOR,
    Z_SCALE_FACTOR,
    X_OFFSET,
    Y_OFFSET,
    Z_OFFSET,
];

fn read_u8(bytes: &[u8], field: FieldSpec) -> u8 {
    bytes[field.offset]
}

fn read_u16(bytes: &[u8], field: FieldSpec) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[field.offset..field.offset + 2]);
    u16::from_le_bytes(buf)
}

fn read_u32(bytes: &[u8], field: FieldSpec) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[field.offset..field.offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_f64(bytes: &[u8], field: FieldSpec) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[field.offset..field.offset + 8]);
    f64::from_le_bytes(buf)
}

fn write_bytes(bytes: &mut [u8], field: FieldSpec, value: &[u8]) {
    bytes[field.offset..field.offset + field.width].copy_from_slice(value);
}

/// Decoded LAS public header block.
///
/// Decoded once per input file at the start of a conversion job and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LasHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub header_size: u16,
    pub offset_to_point_data: u32,
    pub point_data_format: u8,
    pub point_data_record_length: u16,
    pub number_of_point_records: u32,
    /// Per-axis scale factors applied to the raw integer coordinates.
    pub scale: Vector3d,
    /// Per-axis offsets; all zero when decoded with `suppress_offset`.
    pub offset: Vector3d,
    /// True when the per-axis offsets were zeroed at decode time.
    pub offset_suppressed: bool,
}

impl LasHeader {
    /// Number of points a scan with the given skip stride will emit:
    /// `ceil(number_of_point_records / (1 + point_skip))`.
    pub fn target_point_count(&self, point_skip: usize) -> u64 {
        let stride = point_skip as u64 + 1;
        (u64::from(self.number_of_point_records) + stride - 1) / stride
    }
}

/// Decodes the public header block from the start of a LAS file buffer.
///
/// `suppress_offset` zeroes the decoded per-axis offsets in the returned
/// header; LAS offsets are frequently too large for downstream
/// single-precision consumers to retain precision.
///
/// Fails with [`DecodeError::TooShort`] when the buffer cannot hold the
/// fixed header, and [`DecodeError::BadLayout`] when the declared record
/// layout is inconsistent with the buffer. The point-data extent invariant
/// `offset_to_point_data + record_count * record_length <= file length`
/// is enforced here so downstream record scans cannot run out of bounds.
pub fn decode_header(bytes: &[u8], suppress_offset: bool) -> Result<LasHeader, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            need: HEADER_SIZE,
        });
    }

    let record_length = read_u16(bytes, POINT_DATA_RECORD_LENGTH);
    if record_length == 0 {
        return Err(DecodeError::BadLayout(
            "point data record length is zero".to_string(),
        ));
    }
    if record_length < MIN_RECORD_LENGTH {
        return Err(DecodeError::BadLayout(format!(
            "point data record length {} is too small to hold XYZ fields",
            record_length
        )));
    }

    let offset_to_point_data = read_u32(bytes, OFFSET_TO_POINT_DATA);
    if offset_to_point_data as usize > bytes.len() {
        return Err(DecodeError::BadLayout(format!(
            "offset to point data {} exceeds file length {}",
            offset_to_point_data,
            bytes.len()
        )));
    }

    let record_count = read_u32(bytes, NUMBER_OF_POINT_RECORDS);
    let extent =
        u64::from(offset_to_point_data) + u64::from(record_count) * u64::from(record_length);
    if extent > bytes.len() as u64 {
        return Err(DecodeError::BadLayout(format!(
            "point data extends to byte {} but file is {} bytes",
            extent,
            bytes.len()
        )));
    }

    let offset = if suppress_offset {
        Vector3d::zeros()
    } else {
        Vector3d::new(
            read_f64(bytes, X_OFFSET),
            read_f64(bytes, Y_OFFSET),
            read_f64(bytes, Z_OFFSET),
        )
    };

    let version_major = read_u8(bytes, VERSION_MAJOR);
    let version_minor = read_u8(bytes, VERSION_MINOR);
    debug!(
        "decoded LAS {}.{} header: {} record(s) of {} byte(s) at offset {}",
        version_major, version_minor, record_count, record_length, offset_to_point_data
    );

    Ok(LasHeader {
        version_major,
        version_minor,
        header_size: read_u16(bytes, HEADER_SIZE_FIELD),
        offset_to_point_data,
        point_data_format: read_u8(bytes, POINT_DATA_FORMAT),
        point_data_record_length: record_length,
        number_of_point_records: record_count,
        scale: Vector3d::new(
            read_f64(bytes, X_SCALE_FACTOR),
            read_f64(bytes, Y_SCALE_FACTOR),
            read_f64(bytes, Z_SCALE_FACTOR),
        ),
        offset,
        offset_suppressed: suppress_offset,
    })
}

/// Encodes a header back into a `HEADER_SIZE`-byte public header block.
///
/// Writes through the same field table `decode_header` reads from, so
/// decode∘encode is byte-stable on the declared fields. Also serves as the
/// fixture builder for synthetic LAS files in tests.
pub fn encode_header(header: &LasHeader) -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[..4].copy_from_slice(FILE_SIGNATURE);

    write_bytes(&mut bytes, VERSION_MAJOR, &[header.version_major]);
    write_bytes(&mut bytes, VERSION_MINOR, &[header.version_minor]);
    write_bytes(&mut bytes, HEADER_SIZE_FIELD, &header.header_size.to_le_bytes());
    write_bytes(
        &mut bytes,
        OFFSET_TO_POINT_DATA,
        &header.offset_to_point_data.to_le_bytes(),
    );
    write_bytes(&mut bytes, POINT_DATA_FORMAT, &[header.point_data_format]);
    write_bytes(
        &mut bytes,
        POINT_DATA_RECORD_LENGTH,
        &header.point_data_record_length.to_le_bytes(),
    );
    write_bytes(
        &mut bytes,
        NUMBER_OF_POINT_RECORDS,
        &header.number_of_point_records.to_le_bytes(),
    );
    write_bytes(&mut bytes, X_SCALE_FACTOR, &header.scale.x.to_le_bytes());
    write_bytes(&mut bytes, Y_SCALE_FACTOR, &header.scale.y.to_le_bytes());
    write_bytes(&mut bytes, Z_SCALE_FACTOR, &header.scale.z.to_le_bytes());
    write_bytes(&mut bytes, X_OFFSET, &header.offset.x.to_le_bytes());
    write_bytes(&mut bytes, Y_OFFSET, &header.offset.y.to_le_bytes());
    write_bytes(&mut bytes, Z_OFFSET, &header.offset.z.to_le_bytes());

    bytes
}
