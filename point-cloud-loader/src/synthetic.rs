//! Deterministic LAS files for tests and benchmarks.

use std::io::{self, Write};
use std::path::Path;

use constants::las_layout::{INTENSITY_OFFSET, color_offset, standard_record_length};

use crate::bounds::Bounds;
use crate::header::{LasHeader, Version, encode_header};

/// Raw record values for one generated point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticPoint {
    pub raw: [i32; 3],
    pub intensity: u16,
    pub rgb: [u16; 3],
}

/// Builder for an uncompressed LAS file with a known point pattern.
#[derive(Debug, Clone)]
pub struct SyntheticLas {
    points: u64,
    declared_points: Option<u64>,
    version: Version,
    point_format: u8,
    record_length: Option<u16>,
    scale: [f64; 3],
    offset: [f64; 3],
}

impl SyntheticLas {
    pub fn new(points: u64) -> Self {
        Self {
            points,
            declared_points: None,
            version: Version::new(1, 4),
            point_format: 2,
            record_length: None,
            scale: [0.01, 0.01, 0.01],
            offset: [0.0; 3],
        }
    }

    pub fn version(mut self, major: u8, minor: u8) -> Self {
        self.version = Version::new(major, minor);
        self
    }

    pub fn point_format(mut self, format: u8) -> Self {
        self.point_format = format;
        self
    }

    /// Pad records beyond the standard length for the format.
    pub fn record_length(mut self, length: u16) -> Self {
        self.record_length = Some(length);
        self
    }

    pub fn scale(mut self, scale: [f64; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub fn offset(mut self, offset: [f64; 3]) -> Self {
        self.offset = offset;
        self
    }

    /// Write a different point count into the header than the records present.
    pub fn declared_points(mut self, declared: u64) -> Self {
        self.declared_points = Some(declared);
        self
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    fn effective_record_length(&self) -> u16 {
        self.record_length
            .or_else(|| standard_record_length(self.point_format))
            .unwrap_or(20)
    }

    pub fn point(&self, index: u64) -> SyntheticPoint {
        let raw = [
            (index % 10_000) as i32 * 7,
            (index / 10_000) as i32 * 13,
            ((index * 31) % 2_000) as i32 - 1_000,
        ];
        SyntheticPoint {
            raw,
            intensity: (index % 65_536) as u16,
            rgb: [
                ((index * 97) % 65_536) as u16,
                ((index * 193) % 65_536) as u16,
                ((index * 389) % 65_536) as u16,
            ],
        }
    }

    fn world(&self, point: &SyntheticPoint) -> [f64; 3] {
        [0, 1, 2].map(|axis| f64::from(point.raw[axis]) * self.scale[axis] + self.offset[axis])
    }

    /// Header as it will be written, with bounds covering the generated points.
    pub fn header(&self) -> LasHeader {
        let declared = self.declared_points.unwrap_or(self.points);
        let mut bounds = Bounds::new();
        for index in 0..self.points {
            let [x, y, z] = self.world(&self.point(index));
            bounds.update(x, y, z);
        }
        if bounds.is_empty() {
            bounds = Bounds::from_min_max([0.0; 3], [0.0; 3]);
        }

        let extended = self.version.is_extended();
        LasHeader {
            version: self.version,
            offset_to_point_data: self.version.header_size() as u32,
            point_data_format: self.point_format,
            point_data_record_length: self.effective_record_length(),
            legacy_point_count: u32::try_from(declared).unwrap_or(0),
            extended_point_count: if extended { declared } else { 0 },
            number_of_points: declared,
            scale: self.scale,
            offset: self.offset,
            bounds,
        }
    }

    fn encode_record(&self, point: &SyntheticPoint, out: &mut [u8]) {
        for (axis, value) in point.raw.iter().enumerate() {
            out[axis * 4..axis * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        out[INTENSITY_OFFSET..INTENSITY_OFFSET + 2].copy_from_slice(&point.intensity.to_le_bytes());
        if let Some(offset) = color_offset(self.point_format).filter(|offset| offset + 6 <= out.len()) {
            for (channel, value) in point.rgb.iter().enumerate() {
                let at = offset + channel * 2;
                out[at..at + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&encode_header(&self.header()))?;
        let mut record = vec![0u8; usize::from(self.effective_record_length())];
        for index in 0..self.points {
            record.fill(0);
            self.encode_record(&self.point(index), &mut record);
            writer.write_all(&record)?;
        }
        writer.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut bytes);
        bytes
    }

    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(io::BufWriter::new(file))
    }
}
