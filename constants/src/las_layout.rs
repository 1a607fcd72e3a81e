//! Byte layout of the LAS public header and point records.
//! All multi-byte values are little-endian.

/// Bytes read from the start of a file before any point data is touched.
pub const HEADER_SIZE: usize = 375;
/// Smallest header that still carries every field read for versions below 1.4.
pub const LEGACY_HEADER_SIZE: usize = 227;
/// Header size written for version 1.3 files (adds the waveform record start).
pub const V13_HEADER_SIZE: usize = 235;
/// Version 1.4 needs the extended point count, which ends at byte 255.
pub const EXTENDED_HEADER_MIN_SIZE: usize = 255;

pub const SIGNATURE: &[u8; 4] = b"LASF";

pub const VERSION_MAJOR_OFFSET: usize = 24;
pub const VERSION_MINOR_OFFSET: usize = 25;
pub const HEADER_SIZE_OFFSET: usize = 94;
pub const OFFSET_TO_POINT_DATA_OFFSET: usize = 96;
pub const NUMBER_OF_VLRS_OFFSET: usize = 100;
pub const POINT_FORMAT_OFFSET: usize = 104;
pub const RECORD_LENGTH_OFFSET: usize = 105;
pub const LEGACY_POINT_COUNT_OFFSET: usize = 107;
pub const LEGACY_POINTS_BY_RETURN_OFFSET: usize = 111;

pub const SCALE_OFFSETS: [usize; 3] = [131, 139, 147];
pub const COORDINATE_OFFSET_OFFSETS: [usize; 3] = [155, 163, 171];

/// Version 1.4 interleaves the bounds as max/min pairs per axis.
pub const EXTENDED_MAX_OFFSETS: [usize; 3] = [179, 195, 211];
pub const EXTENDED_MIN_OFFSETS: [usize; 3] = [187, 203, 219];

/// Versions up to 1.3 store all maxima first, then all minima.
pub const LEGACY_MAX_OFFSETS: [usize; 3] = [179, 187, 195];
pub const LEGACY_MIN_OFFSETS: [usize; 3] = [203, 211, 219];

pub const EXTENDED_POINT_COUNT_OFFSET: usize = 247;
pub const EXTENDED_POINTS_BY_RETURN_OFFSET: usize = 255;

/// Low six bits of the format byte carry the point data format id.
pub const POINT_FORMAT_MASK: u8 = 0x3f;
/// Set by LAZ writers on the format byte.
pub const COMPRESSION_BIT: u8 = 0x80;

/// Every point format stores X, Y, Z as i32 followed by a u16 intensity.
pub const COORDINATES_LEN: usize = 12;
pub const INTENSITY_OFFSET: usize = 12;
/// Point format 0 is 20 bytes, the smallest legal record.
pub const MIN_RECORD_LENGTH: u16 = 20;
/// Red, green and blue as three consecutive u16 values.
pub const COLOR_LEN: usize = 6;

/// Offset of the RGB triple inside a record, for formats that carry color.
pub const fn color_offset(format: u8) -> Option<usize> {
    match format {
        2 => Some(20),
        3 | 5 => Some(28),
        7 | 8 | 10 => Some(30),
        _ => None,
    }
}

/// Record length defined by the LAS standard for each point format.
pub const fn standard_record_length(format: u8) -> Option<u16> {
    match format {
        0 => Some(20),
        1 => Some(28),
        2 => Some(26),
        3 => Some(34),
        4 => Some(57),
        5 => Some(63),
        6 => Some(30),
        7 => Some(36),
        8 => Some(38),
        9 => Some(59),
        10 => Some(67),
        _ => None,
    }
}
