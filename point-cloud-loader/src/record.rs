//! Point record decoding.

use constants::las_layout::{COLOR_LEN, INTENSITY_OFFSET, color_offset};

use crate::bounds::Bounds;
use crate::chunk::Chunk;
use crate::header::LasHeader;

/// Everything needed to decode records without holding on to the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordLayout {
    pub record_length: usize,
    /// Offset of the RGB triple, `None` when the record carries no color.
    pub color_offset: Option<usize>,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    /// Subtracted from every coordinate before it is narrowed to `f32`.
    pub origin: [f64; 3],
    pub keep_intensity: bool,
}

impl RecordLayout {
    pub fn new(header: &LasHeader, origin: [f64; 3], keep_intensity: bool) -> Self {
        let record_length = usize::from(header.point_data_record_length);
        Self {
            record_length,
            color_offset: color_offset(header.point_data_format)
                .filter(|offset| offset + COLOR_LEN <= record_length),
            scale: header.scale,
            offset: header.offset,
            origin,
            keep_intensity,
        }
    }

    pub fn from_header(header: &LasHeader) -> Self {
        Self::new(header, [0.0; 3], true)
    }
}

struct DecodedPoint {
    world: [f64; 3],
    intensity: u16,
    color: [u8; 3],
}

fn read_i32(record: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        record[offset],
        record[offset + 1],
        record[offset + 2],
        record[offset + 3],
    ])
}

fn read_u16(record: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([record[offset], record[offset + 1]])
}

/// Returns `None` for records whose coordinates do not resolve to finite values.
fn decode_point(record: &[u8], layout: &RecordLayout) -> Option<DecodedPoint> {
    let mut world = [0.0f64; 3];
    for (axis, value) in world.iter_mut().enumerate() {
        let raw = f64::from(read_i32(record, axis * 4));
        *value = raw * layout.scale[axis] + layout.offset[axis];
        if !value.is_finite() {
            return None;
        }
    }

    let intensity = read_u16(record, INTENSITY_OFFSET);
    // 16-bit color keeps the high byte; records without RGB are grey from intensity
    let color = match layout.color_offset {
        Some(offset) => [0, 1, 2].map(|channel| (read_u16(record, offset + channel * 2) >> 8) as u8),
        None => [(intensity >> 8) as u8; 3],
    };

    Some(DecodedPoint {
        world,
        intensity,
        color,
    })
}

/// Decode up to `requested` records from the start of `buffer`.
///
/// Decoding stops at the first record that would run past the end of the
/// buffer. Records with non-finite coordinates are skipped. The returned
/// chunk's `count` is the number of points actually decoded.
pub fn decode_records(
    buffer: &[u8],
    layout: &RecordLayout,
    requested: usize,
    first_point: u64,
) -> Chunk {
    if layout.record_length == 0 {
        return Chunk::empty(first_point);
    }
    let capacity = requested.min(buffer.len() / layout.record_length);
    let mut positions = Vec::with_capacity(capacity * 3);
    let mut colors = Vec::with_capacity(capacity * 3);
    let mut intensities = layout.keep_intensity.then(|| Vec::with_capacity(capacity));
    let mut bounds = Bounds::new();
    let mut skipped = 0usize;

    for index in 0..requested {
        let start = index * layout.record_length;
        let Some(record) = buffer.get(start..start + layout.record_length) else {
            break;
        };
        let Some(point) = decode_point(record, layout) else {
            skipped += 1;
            continue;
        };

        let [x, y, z] = point.world;
        bounds.update(x, y, z);
        for axis in 0..3 {
            positions.push((point.world[axis] - layout.origin[axis]) as f32);
        }
        colors.extend_from_slice(&point.color);
        if let Some(intensities) = intensities.as_mut() {
            intensities.push(point.intensity);
        }
    }

    if skipped > 0 {
        tracing::debug!(first_point, skipped, "skipped malformed point records");
    }

    let count = positions.len() / 3;
    Chunk {
        positions,
        colors,
        intensities,
        bounds,
        count,
        first_point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(length: usize, xyz: [i32; 3], intensity: u16, color_at: Option<(usize, [u16; 3])>) -> Vec<u8> {
        let mut out = vec![0u8; length];
        for (axis, value) in xyz.into_iter().enumerate() {
            out[axis * 4..axis * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        out[12..14].copy_from_slice(&intensity.to_le_bytes());
        if let Some((offset, rgb)) = color_at {
            for (channel, value) in rgb.into_iter().enumerate() {
                let at = offset + channel * 2;
                out[at..at + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
        out
    }

    fn layout(record_length: usize, color_offset: Option<usize>) -> RecordLayout {
        RecordLayout {
            record_length,
            color_offset,
            scale: [0.01, 0.01, 0.001],
            offset: [100.0, 200.0, 0.0],
            origin: [0.0; 3],
            keep_intensity: true,
        }
    }

    #[test]
    fn applies_scale_and_offset() {
        let buffer = record(20, [150, -250, 4_000], 0x2a4d, None);
        let chunk = decode_records(&buffer, &layout(20, None), 1, 9);

        assert_eq!(chunk.count, 1);
        assert_eq!(chunk.first_point, 9);
        assert_eq!(chunk.position(0), [101.5, 197.5, 4.0]);
        assert_eq!(chunk.color(0), [0x2a; 3]);
        assert_eq!(chunk.intensities, Some(vec![0x2a4d]));
        assert_eq!(chunk.bounds.min(), [101.5, 197.5, 4.0]);
    }

    #[test]
    fn uncolored_records_take_grey_from_intensity() {
        let buffer = record(20, [0, 0, 0], 0xab12, None);
        let chunk = decode_records(&buffer, &layout(20, None), 1, 0);
        assert_eq!(chunk.color(0), [0xab; 3]);

        let mut layout = layout(20, None);
        layout.keep_intensity = false;
        let chunk = decode_records(&buffer, &layout, 1, 0);
        assert_eq!(chunk.color(0), [0xab; 3]);
    }

    #[test]
    fn keeps_high_byte_of_color() {
        let buffer = record(26, [0, 0, 0], 0, Some((20, [0xff00, 0x1234, 0x00ff])));
        let chunk = decode_records(&buffer, &layout(26, Some(20)), 1, 0);
        assert_eq!(chunk.color(0), [0xff, 0x12, 0x00]);
    }

    #[test]
    fn stops_at_the_end_of_a_short_buffer() {
        let mut buffer = Vec::new();
        for i in 0..5 {
            buffer.extend(record(20, [i, i, i], 0, None));
        }
        buffer.truncate(4 * 20 + 11);

        let chunk = decode_records(&buffer, &layout(20, None), 10, 0);
        assert_eq!(chunk.count, 4);
        assert_eq!(chunk.positions.len(), 12);
        assert_eq!(chunk.colors.len(), 12);
        assert_eq!(chunk.intensities.map(|values| values.len()), Some(4));
    }

    #[test]
    fn skips_non_finite_points() {
        let mut layout = layout(20, None);
        layout.scale = [f64::MAX, 1.0, 1.0];
        let mut buffer = record(20, [0, 1, 1], 0, None);
        buffer.extend(record(20, [i32::MAX, 1, 1], 0, None));

        let chunk = decode_records(&buffer, &layout, 2, 0);
        assert_eq!(chunk.count, 1);
    }

    #[test]
    fn origin_is_subtracted_and_intensity_can_be_dropped() {
        let mut layout = layout(20, None);
        layout.origin = [100.0, 200.0, 0.0];
        layout.keep_intensity = false;
        let buffer = record(20, [10, 20, 30], 5, None);

        let chunk = decode_records(&buffer, &layout, 1, 0);
        assert_eq!(chunk.position(0), [0.1, 0.2, 0.03]);
        assert_eq!(chunk.intensities, None);
        assert_eq!(chunk.bounds.min_x, 100.1);
    }
}
