use std::io;

use point_cloud_loader::crosscheck::cross_check;
use point_cloud_loader::synthetic::SyntheticLas;
use point_cloud_loader::{
    ChunkSource, FileSource, LoadError, MemorySource, StreamConfig, StreamSession, StreamStep,
    TruncatedData, stream_chunks, stream_chunks_parallel,
};

fn config(points_per_chunk: u64) -> StreamConfig {
    StreamConfig {
        points_per_chunk,
        max_workers: 4,
        ..StreamConfig::default()
    }
}

#[test]
fn truncated_file_streams_what_is_present() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.las");
    SyntheticLas::new(700_000)
        .point_format(0)
        .declared_points(1_000_000)
        .write_file(&path)
        .unwrap();

    let mut progress = Vec::new();
    let result = stream_chunks_parallel(
        FileSource::open(&path).unwrap(),
        config(200_000),
        |p| progress.push(p),
    )
    .unwrap();

    assert_eq!(
        result.truncation,
        Some(TruncatedData {
            declared: 1_000_000,
            available: 700_000
        })
    );
    assert_eq!(result.chunks.len(), 4);
    assert_eq!(result.chunks[3].count, 100_000);
    assert_eq!(result.chunks[3].first_point, 600_000);
    assert_eq!(result.total_points(), 700_000);
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn chunk_contents_follow_the_file() {
    let synthetic = SyntheticLas::new(5_003).version(1, 2).point_format(3);
    let result = stream_chunks(MemorySource::new(synthetic.to_bytes()), config(1_000), |_| {}).unwrap();
    let scale = synthetic.header().scale;

    for chunk in &result.chunks {
        assert_eq!(chunk.positions.len(), chunk.count * 3);
        assert_eq!(chunk.colors.len(), chunk.count * 3);
        for index in (0..chunk.count).step_by(97) {
            let point = synthetic.point(chunk.first_point + index as u64);
            let position = chunk.position(index);
            for axis in 0..3 {
                let expected = f64::from(point.raw[axis]) * scale[axis];
                assert!((f64::from(position[axis]) - expected).abs() < 1e-3);
            }
            assert_eq!(chunk.color(index), point.rgb.map(|channel| (channel >> 8) as u8));
            assert_eq!(chunk.intensities.as_ref().unwrap()[index], point.intensity);
        }
    }
    assert_eq!(result.chunks.last().unwrap().count, 3);
}

#[test]
fn formats_without_color_take_grey_from_intensity() {
    for format in [0, 1] {
        let synthetic = SyntheticLas::new(70_000).point_format(format);
        let result =
            stream_chunks(MemorySource::new(synthetic.to_bytes()), config(20_000), |_| {}).unwrap();
        assert_eq!(result.total_points(), 70_000);

        for chunk in &result.chunks {
            for index in (0..chunk.count).step_by(251) {
                let point = synthetic.point(chunk.first_point + index as u64);
                assert_eq!(chunk.color(index), [(point.intensity >> 8) as u8; 3]);
            }
        }
        let last = result.chunks.last().unwrap();
        assert_eq!(last.color(last.count - 1), [(69_999u32 % 65_536 >> 8) as u8; 3]);
    }
}

#[test]
fn padded_records_are_skipped_over() {
    let synthetic = SyntheticLas::new(50).point_format(2).record_length(40);
    let result = stream_chunks(MemorySource::new(synthetic.to_bytes()), config(16), |_| {}).unwrap();
    assert_eq!(result.total_points(), 50);
    let last = &result.chunks[3];
    assert_eq!(last.count, 2);
    assert_eq!(
        last.color(1),
        synthetic.point(49).rgb.map(|channel| (channel >> 8) as u8)
    );
}

#[test]
fn missing_counts_are_derived_from_file_size() {
    let bytes = SyntheticLas::new(321).declared_points(0).to_bytes();
    let result = stream_chunks(MemorySource::new(bytes), config(100), |_| {}).unwrap();
    assert_eq!(result.header.number_of_points, 321);
    assert_eq!(result.total_points(), 321);
    assert_eq!(result.truncation, None);
}

#[test]
fn non_las_input_is_rejected() {
    let error = stream_chunks(MemorySource::new(vec![b'x'; 400]), config(100), |_| {}).unwrap_err();
    assert!(matches!(error, LoadError::Format(_)));
}

/// Refuses any single read larger than `max_read`.
struct CappedSource {
    inner: MemorySource,
    max_read: u64,
    failures: usize,
}

impl ChunkSource for CappedSource {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        if end - start > self.max_read {
            self.failures += 1;
            return Err(io::Error::other("read too large"));
        }
        self.inner.read_range(start, end)
    }
}

#[test]
fn large_chunk_reads_fall_back_to_parts() {
    let synthetic = SyntheticLas::new(2_000).point_format(0);
    let mut source = CappedSource {
        inner: MemorySource::new(synthetic.to_bytes()),
        max_read: 4_096,
        failures: 0,
    };
    let cfg = StreamConfig {
        large_read_threshold: 8_192,
        read_part_size: 4_000,
        ..config(1_000)
    };

    let result = stream_chunks(&mut source, cfg, |_| {}).unwrap();
    assert_eq!(result.total_points(), 2_000);
    assert_eq!(source.failures, 2);
}

#[test]
fn read_failure_below_threshold_aborts() {
    let mut source = CappedSource {
        inner: MemorySource::new(SyntheticLas::new(2_000).point_format(0).to_bytes()),
        max_read: 4_096,
        failures: 0,
    };
    let error = stream_chunks(&mut source, config(1_000), |_| {}).unwrap_err();
    assert!(matches!(error, LoadError::Read(failure) if failure.end - failure.start == 20_000));
}

#[test]
fn session_with_pool_can_be_ticked_to_completion() {
    let bytes = SyntheticLas::new(9_999).to_bytes();
    let pool = point_cloud_loader::DecodeWorkerPool::new(2).unwrap();
    let mut session = StreamSession::open(MemorySource::new(bytes), config(1_000))
        .unwrap()
        .with_pool(pool);

    let mut last = 0.0;
    loop {
        match session.tick().unwrap() {
            StreamStep::Pending { progress } => {
                assert!(progress >= last);
                last = progress;
                std::thread::yield_now();
            }
            StreamStep::Finished => break,
        }
    }
    let result = session.finish();
    assert_eq!(result.chunks.len(), 10);
    assert!(result.chunks.windows(2).all(|pair| pair[0].first_point < pair[1].first_point));
}

#[test]
fn agrees_with_las_crate_reader() {
    let dir = tempfile::tempdir().unwrap();
    for (name, major, minor, format) in [("v12.las", 1, 2, 3), ("v14.las", 1, 4, 2)] {
        let path = dir.path().join(name);
        SyntheticLas::new(4_321)
            .version(major, minor)
            .point_format(format)
            .offset([1_000.0, 2_000.0, 10.0])
            .write_file(&path)
            .unwrap();

        let report = cross_check(&path, 4_321).unwrap();
        assert_eq!(report.points_compared, 4_321, "{name}");
        assert!(report.is_clean(), "{name}: {:?}", report.mismatches);
    }
}
