//! LAS public header decoding and encoding.
//!
//! Only the fields needed to locate and decode point records are kept. The
//! bounds layout depends on the version: 1.4 interleaves max/min per axis,
//! older versions store the three maxima followed by the three minima.

use constants::las_layout::*;
use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::error::{FormatError, TruncatedData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Versions 1.4 and later carry the 64-bit point count and the interleaved bounds.
    pub fn is_extended(self) -> bool {
        (self.major, self.minor) >= (1, 4)
    }

    /// Size of the header a conforming writer emits for this version.
    pub fn header_size(self) -> usize {
        match (self.major, self.minor) {
            (1, 0..=2) => LEGACY_HEADER_SIZE,
            (1, 3) => V13_HEADER_SIZE,
            _ => HEADER_SIZE,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LasHeader {
    pub version: Version,
    pub offset_to_point_data: u32,
    pub point_data_format: u8,
    pub point_data_record_length: u16,
    /// Raw 32-bit count at byte 107.
    pub legacy_point_count: u32,
    /// Raw 64-bit count at byte 247, zero below version 1.4.
    pub extended_point_count: u64,
    /// Resolved count: extended if non-zero, then legacy, then derived from file size.
    pub number_of_points: u64,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub bounds: Bounds,
}

impl LasHeader {
    /// Records that fit between the start of point data and the end of the file.
    pub fn available_points(&self, file_size: u64) -> u64 {
        if self.point_data_record_length == 0 {
            return 0;
        }
        file_size.saturating_sub(u64::from(self.offset_to_point_data))
            / u64::from(self.point_data_record_length)
    }

    /// Fill in the point count from the file size when the header declares none.
    pub fn resolve_point_count(&mut self, file_size: u64) {
        if self.number_of_points == 0 {
            self.number_of_points = self.available_points(file_size);
        }
    }

    /// Reports a header that declares more points than the file holds.
    pub fn check_truncation(&self, file_size: u64) -> Option<TruncatedData> {
        let available = self.available_points(file_size);
        (self.number_of_points > available).then_some(TruncatedData {
            declared: self.number_of_points,
            available,
        })
    }

    /// Byte offset of the record holding point `index`.
    pub fn record_offset(&self, index: u64) -> u64 {
        u64::from(self.offset_to_point_data)
            .saturating_add(index.saturating_mul(u64::from(self.point_data_record_length)))
    }

    pub fn has_color(&self) -> bool {
        color_offset(self.point_data_format).is_some_and(|offset| {
            offset + COLOR_LEN <= usize::from(self.point_data_record_length)
        })
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(read_array(bytes, offset))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(bytes, offset))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(read_array(bytes, offset))
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(read_array(bytes, offset))
}

fn read_f64_triple(bytes: &[u8], offsets: [usize; 3]) -> [f64; 3] {
    offsets.map(|offset| read_f64(bytes, offset))
}

/// Decode the public header from the first bytes of a file.
///
/// `bytes` may be shorter than [`HEADER_SIZE`] for small pre-1.4 files, as
/// long as every field the version needs is present. The returned
/// `number_of_points` is zero when neither count field is set; call
/// [`LasHeader::resolve_point_count`] once the file size is known.
pub fn decode_header(bytes: &[u8]) -> Result<LasHeader, FormatError> {
    if bytes.len() < SIGNATURE.len() {
        return Err(FormatError::HeaderTooShort {
            len: bytes.len(),
            expected: LEGACY_HEADER_SIZE,
        });
    }
    if &bytes[..SIGNATURE.len()] != SIGNATURE {
        return Err(FormatError::BadSignature {
            found: String::from_utf8_lossy(&bytes[..SIGNATURE.len()]).into_owned(),
        });
    }
    if bytes.len() < LEGACY_HEADER_SIZE {
        return Err(FormatError::HeaderTooShort {
            len: bytes.len(),
            expected: LEGACY_HEADER_SIZE,
        });
    }

    let version = Version::new(bytes[VERSION_MAJOR_OFFSET], bytes[VERSION_MINOR_OFFSET]);
    if version.is_extended() && bytes.len() < EXTENDED_HEADER_MIN_SIZE {
        return Err(FormatError::HeaderTooShort {
            len: bytes.len(),
            expected: EXTENDED_HEADER_MIN_SIZE,
        });
    }

    let format_byte = bytes[POINT_FORMAT_OFFSET];
    if format_byte & COMPRESSION_BIT != 0 {
        return Err(FormatError::Compressed { format_byte });
    }
    let point_data_format = format_byte & POINT_FORMAT_MASK;
    let point_data_record_length = read_u16(bytes, RECORD_LENGTH_OFFSET);
    if point_data_record_length < MIN_RECORD_LENGTH {
        return Err(FormatError::RecordTooShort {
            length: point_data_record_length,
            format: point_data_format,
        });
    }

    let legacy_point_count = read_u32(bytes, LEGACY_POINT_COUNT_OFFSET);
    let (extended_point_count, min, max) = if version.is_extended() {
        (
            read_u64(bytes, EXTENDED_POINT_COUNT_OFFSET),
            read_f64_triple(bytes, EXTENDED_MIN_OFFSETS),
            read_f64_triple(bytes, EXTENDED_MAX_OFFSETS),
        )
    } else {
        (
            0,
            read_f64_triple(bytes, LEGACY_MIN_OFFSETS),
            read_f64_triple(bytes, LEGACY_MAX_OFFSETS),
        )
    };

    let number_of_points = if extended_point_count > 0 {
        extended_point_count
    } else {
        u64::from(legacy_point_count)
    };

    Ok(LasHeader {
        version,
        offset_to_point_data: read_u32(bytes, OFFSET_TO_POINT_DATA_OFFSET),
        point_data_format,
        point_data_record_length,
        legacy_point_count,
        extended_point_count,
        number_of_points,
        scale: read_f64_triple(bytes, SCALE_OFFSETS),
        offset: read_f64_triple(bytes, COORDINATE_OFFSET_OFFSETS),
        bounds: Bounds::from_min_max(min, max),
    })
}

fn write_bytes(out: &mut [u8], offset: usize, value: &[u8]) {
    out[offset..offset + value.len()].copy_from_slice(value);
}

fn write_f64_triple(out: &mut [u8], offsets: [usize; 3], values: [f64; 3]) {
    for (offset, value) in offsets.into_iter().zip(values) {
        write_bytes(out, offset, &value.to_le_bytes());
    }
}

/// Encode a header using the same layout [`decode_header`] reads.
///
/// The output is [`Version::header_size`] bytes long with no variable length
/// records; all points are reported as first returns.
pub fn encode_header(header: &LasHeader) -> Vec<u8> {
    let header_size = header.version.header_size();
    let mut out = vec![0u8; header_size];

    write_bytes(&mut out, 0, SIGNATURE);
    out[VERSION_MAJOR_OFFSET] = header.version.major;
    out[VERSION_MINOR_OFFSET] = header.version.minor;
    write_bytes(&mut out, HEADER_SIZE_OFFSET, &(header_size as u16).to_le_bytes());
    write_bytes(
        &mut out,
        OFFSET_TO_POINT_DATA_OFFSET,
        &header.offset_to_point_data.to_le_bytes(),
    );
    write_bytes(&mut out, NUMBER_OF_VLRS_OFFSET, &0u32.to_le_bytes());
    out[POINT_FORMAT_OFFSET] = header.point_data_format & POINT_FORMAT_MASK;
    write_bytes(
        &mut out,
        RECORD_LENGTH_OFFSET,
        &header.point_data_record_length.to_le_bytes(),
    );
    write_bytes(
        &mut out,
        LEGACY_POINT_COUNT_OFFSET,
        &header.legacy_point_count.to_le_bytes(),
    );
    write_bytes(
        &mut out,
        LEGACY_POINTS_BY_RETURN_OFFSET,
        &header.legacy_point_count.to_le_bytes(),
    );
    write_f64_triple(&mut out, SCALE_OFFSETS, header.scale);
    write_f64_triple(&mut out, COORDINATE_OFFSET_OFFSETS, header.offset);

    if header.version.is_extended() {
        write_f64_triple(&mut out, EXTENDED_MIN_OFFSETS, header.bounds.min());
        write_f64_triple(&mut out, EXTENDED_MAX_OFFSETS, header.bounds.max());
        write_bytes(
            &mut out,
            EXTENDED_POINT_COUNT_OFFSET,
            &header.extended_point_count.to_le_bytes(),
        );
        write_bytes(
            &mut out,
            EXTENDED_POINTS_BY_RETURN_OFFSET,
            &header.extended_point_count.to_le_bytes(),
        );
    } else {
        write_f64_triple(&mut out, LEGACY_MIN_OFFSETS, header.bounds.min());
        write_f64_triple(&mut out, LEGACY_MAX_OFFSETS, header.bounds.max());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(version: Version) -> LasHeader {
        let extended = version.is_extended();
        LasHeader {
            version,
            offset_to_point_data: version.header_size() as u32,
            point_data_format: 2,
            point_data_record_length: 26,
            legacy_point_count: 1_000,
            extended_point_count: if extended { 1_000 } else { 0 },
            number_of_points: 1_000,
            scale: [0.01, 0.01, 0.001],
            offset: [500_000.0, 4_000_000.0, 0.0],
            bounds: Bounds::from_min_max([500_001.0, 4_000_002.0, 3.0], [500_101.0, 4_000_202.0, 33.0]),
        }
    }

    #[test]
    fn decodes_both_bounds_layouts() {
        for version in [Version::new(1, 2), Version::new(1, 3), Version::new(1, 4)] {
            let header = sample_header(version);
            let decoded = decode_header(&encode_header(&header)).unwrap();
            assert_eq!(decoded, header, "version {version}");
        }
    }

    #[test]
    fn legacy_layout_reads_maxima_before_minima() {
        let mut bytes = encode_header(&sample_header(Version::new(1, 2)));
        bytes[LEGACY_MAX_OFFSETS[1]..LEGACY_MAX_OFFSETS[1] + 8].copy_from_slice(&42.0f64.to_le_bytes());
        let decoded = decode_header(&bytes).unwrap();
        assert_eq!(decoded.bounds.max_y, 42.0);
    }

    #[test]
    fn extended_count_wins_over_legacy() {
        let mut header = sample_header(Version::new(1, 4));
        header.legacy_point_count = 0;
        header.extended_point_count = 5_000_000_000;
        header.number_of_points = 5_000_000_000;
        let decoded = decode_header(&encode_header(&header)).unwrap();
        assert_eq!(decoded.number_of_points, 5_000_000_000);
    }

    #[test]
    fn zero_counts_are_derived_from_file_size() {
        let mut header = sample_header(Version::new(1, 4));
        header.legacy_point_count = 0;
        header.extended_point_count = 0;
        header.number_of_points = 0;
        let mut decoded = decode_header(&encode_header(&header)).unwrap();
        assert_eq!(decoded.number_of_points, 0);

        let file_size = u64::from(decoded.offset_to_point_data) + 26 * 40 + 7;
        decoded.resolve_point_count(file_size);
        assert_eq!(decoded.number_of_points, 40);
        assert_eq!(decoded.check_truncation(file_size), None);
    }

    #[test]
    fn truncation_is_reported() {
        let header = sample_header(Version::new(1, 2));
        let file_size = u64::from(header.offset_to_point_data) + 26 * 700;
        assert_eq!(
            header.check_truncation(file_size),
            Some(TruncatedData {
                declared: 1_000,
                available: 700
            })
        );
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = encode_header(&sample_header(Version::new(1, 4)));
        bytes[..4].copy_from_slice(b"PK\x03\x04");
        assert!(matches!(
            decode_header(&bytes),
            Err(FormatError::BadSignature { .. })
        ));
    }

    #[test]
    fn rejects_short_input() {
        let bytes = encode_header(&sample_header(Version::new(1, 4)));
        assert!(matches!(
            decode_header(&bytes[..200]),
            Err(FormatError::HeaderTooShort { len: 200, .. })
        ));
        assert!(matches!(
            decode_header(&bytes[..240]),
            Err(FormatError::HeaderTooShort { len: 240, expected: 255 })
        ));
    }

    #[test]
    fn rejects_compressed_and_undersized_records() {
        let mut bytes = encode_header(&sample_header(Version::new(1, 2)));
        bytes[POINT_FORMAT_OFFSET] = 0x83;
        assert!(matches!(
            decode_header(&bytes),
            Err(FormatError::Compressed { format_byte: 0x83 })
        ));

        bytes[POINT_FORMAT_OFFSET] = 3;
        bytes[RECORD_LENGTH_OFFSET..RECORD_LENGTH_OFFSET + 2].copy_from_slice(&12u16.to_le_bytes());
        assert!(matches!(
            decode_header(&bytes),
            Err(FormatError::RecordTooShort { length: 12, format: 3 })
        ));
    }

    #[test]
    fn color_requires_room_in_record() {
        let mut header = sample_header(Version::new(1, 2));
        assert!(header.has_color());
        header.point_data_format = 3;
        header.point_data_record_length = 28;
        assert!(!header.has_color());
        header.point_data_format = 1;
        header.point_data_record_length = 40;
        assert!(!header.has_color());
    }
}
