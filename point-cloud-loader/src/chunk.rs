use crate::bounds::Bounds;
use crate::error::TruncatedData;
use crate::header::LasHeader;

/// A batch of decoded points in structure-of-arrays form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    /// `count * 3` coordinates, relative to the decode origin.
    pub positions: Vec<f32>,
    /// `count * 3` color components, zero when the format has no color.
    pub colors: Vec<u8>,
    /// `count` raw intensities, absent when intensity is not kept.
    pub intensities: Option<Vec<u16>>,
    /// Bounds of the decoded points in file coordinates.
    pub bounds: Bounds,
    pub count: usize,
    /// File index of the first point in this chunk.
    pub first_point: u64,
}

impl Chunk {
    pub fn empty(first_point: u64) -> Self {
        Self {
            first_point,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn position(&self, index: usize) -> [f32; 3] {
        let base = index * 3;
        [
            self.positions[base],
            self.positions[base + 1],
            self.positions[base + 2],
        ]
    }

    pub fn color(&self, index: usize) -> [u8; 3] {
        let base = index * 3;
        [self.colors[base], self.colors[base + 1], self.colors[base + 2]]
    }
}

/// Byte range and point span of one chunk before it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub index: usize,
    pub start_point: u64,
    pub point_count: u64,
    pub byte_start: u64,
    /// Exclusive, clamped to the file size.
    pub byte_end: u64,
}

impl ChunkPlan {
    /// Chunks that start at or past the end of the file are skipped.
    pub fn is_empty(&self) -> bool {
        self.byte_start >= self.byte_end
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_end.saturating_sub(self.byte_start)
    }
}

/// Split the declared points into chunks of `points_per_chunk` records.
///
/// The last chunk holds the remainder. Byte ranges are clamped to
/// `file_size`, so plans past a truncated tail come back empty.
pub fn plan_chunks(header: &LasHeader, file_size: u64, points_per_chunk: u64) -> Vec<ChunkPlan> {
    let total = header.number_of_points;
    if total == 0 || points_per_chunk == 0 {
        return Vec::new();
    }
    let record_length = u64::from(header.point_data_record_length);
    let chunk_count = total.div_ceil(points_per_chunk);

    (0..chunk_count)
        .map(|index| {
            let start_point = index * points_per_chunk;
            let point_count = points_per_chunk.min(total - start_point);
            let byte_start = header.record_offset(start_point);
            let byte_end = byte_start
                .saturating_add(point_count.saturating_mul(record_length))
                .min(file_size);
            ChunkPlan {
                index: index as usize,
                start_point,
                point_count,
                byte_start,
                byte_end,
            }
        })
        .collect()
}

/// Everything produced by one load.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub header: LasHeader,
    /// Non-empty chunks in file order.
    pub chunks: Vec<Chunk>,
    /// Union of all chunk bounds.
    pub bounds: Bounds,
    /// Origin subtracted from positions while decoding.
    pub origin: [f64; 3],
    /// Set when the header declared more points than were present.
    pub truncation: Option<TruncatedData>,
}

impl StreamResult {
    pub fn total_points(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.count as u64).sum()
    }
}
