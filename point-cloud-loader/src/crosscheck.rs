//! Compare the streaming decoder against the `las` crate's reader.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use las::Reader;

use crate::config::StreamConfig;
use crate::source::FileSource;
use crate::streamer::stream_chunks;

/// Coordinates may differ by rounding of the `f32` positions.
const POSITION_TOLERANCE: f64 = 1e-2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossCheckReport {
    pub points_compared: u64,
    pub mismatches: Vec<String>,
}

impl CrossCheckReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn mismatch(&mut self, message: String) {
        tracing::warn!(%message, "cross-check mismatch");
        self.mismatches.push(message);
    }
}

/// Create LAS file reader for point cloud access.
pub fn create_reader(file_path: &Path) -> anyhow::Result<Reader> {
    let file = File::open(file_path)?;
    Ok(Reader::new(BufReader::new(file))?)
}

/// Stream `path` and compare the first `sample` points, plus the header
/// fields both readers agree on, with what `las::Reader` reports.
pub fn cross_check(path: &Path, sample: u64) -> anyhow::Result<CrossCheckReport> {
    let mut reader = create_reader(path)?;
    let config = StreamConfig {
        recenter: false,
        ..StreamConfig::default()
    };
    let streamed = stream_chunks(FileSource::open(path)?, config, |_| {})?;

    let mut report = CrossCheckReport::default();
    let reference = reader.header();
    let header = &streamed.header;

    let version = reference.version();
    if (version.major, version.minor) != (header.version.major, header.version.minor) {
        report.mismatch(format!("version {} vs {}.{}", header.version, version.major, version.minor));
    }
    if reference.number_of_points() != streamed.total_points() {
        report.mismatch(format!(
            "point count {} vs {}",
            streamed.total_points(),
            reference.number_of_points()
        ));
    }
    let format = reference.point_format().to_u8()?;
    if format != header.point_data_format {
        report.mismatch(format!("point format {} vs {format}", header.point_data_format));
    }
    let transforms = reference.transforms();
    let reference_scale = [transforms.x.scale, transforms.y.scale, transforms.z.scale];
    let reference_offset = [transforms.x.offset, transforms.y.offset, transforms.z.offset];
    if reference_scale != header.scale || reference_offset != header.offset {
        report.mismatch(format!(
            "transforms {:?}/{:?} vs {reference_scale:?}/{reference_offset:?}",
            header.scale, header.offset
        ));
    }

    let streamed_points = streamed.chunks.iter().flat_map(|chunk| {
        (0..chunk.count).map(move |index| {
            (
                chunk.first_point + index as u64,
                chunk.position(index),
                chunk.color(index),
                chunk.intensities.as_ref().map(|values| values[index]),
            )
        })
    });

    for (reference_point, (point_index, position, color, intensity)) in
        reader.points().take(sample as usize).zip(streamed_points)
    {
        let reference_point = reference_point?;
        report.points_compared += 1;

        let expected = [reference_point.x, reference_point.y, reference_point.z];
        let close = expected.iter().zip(position).all(|(expected, actual)| {
            (expected - f64::from(actual)).abs() <= POSITION_TOLERANCE * expected.abs().max(1.0)
        });
        if !close {
            report.mismatch(format!("point {point_index}: position {position:?} vs {expected:?}"));
        }
        if let Some(intensity) = intensity.filter(|value| *value != reference_point.intensity) {
            report.mismatch(format!(
                "point {point_index}: intensity {intensity} vs {}",
                reference_point.intensity
            ));
        }
        if let Some(rgb) = reference_point.color {
            let expected = [rgb.red, rgb.green, rgb.blue].map(|channel| (channel >> 8) as u8);
            if expected != color {
                report.mismatch(format!("point {point_index}: color {color:?} vs {expected:?}"));
            }
        }
    }

    tracing::info!(
        points = report.points_compared,
        mismatches = report.mismatches.len(),
        "cross-check finished"
    );
    Ok(report)
}
