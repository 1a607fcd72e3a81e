//! Chunked streaming of a LAS file.
//!
//! A [`StreamSession`] owns the source and walks the chunk plan one bounded
//! unit at a time through [`StreamSession::tick`], so a frame loop can
//! interleave loading with rendering. Reads always happen on the caller's
//! thread. Decoding happens inline, or on a [`DecodeWorkerPool`] when one is
//! attached, in which case results may arrive out of order and are slotted
//! back by chunk index.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use constants::las_layout::HEADER_SIZE;

use crate::bounds::Bounds;
use crate::chunk::{Chunk, ChunkPlan, StreamResult, plan_chunks};
use crate::config::StreamConfig;
use crate::error::{LoadError, LoadResult, TruncatedData};
use crate::header::{LasHeader, decode_header};
use crate::pool::{ChunkTask, DecodeWorkerPool, PendingChunk};
use crate::record::{RecordLayout, decode_records};
use crate::source::{ChunkSource, read_with_fallback};

/// Shared flag for stopping a session from outside its loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one [`StreamSession::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamStep {
    /// More work remains. `progress` is the fraction of planned chunks done.
    Pending { progress: f32 },
    Finished,
}

/// Collects chunk results in file order, whatever order they arrive in.
#[derive(Debug, Default)]
struct ChunkAssembler {
    total: usize,
    completed: usize,
    slots: BTreeMap<usize, Chunk>,
    bounds: Bounds,
}

impl ChunkAssembler {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn accept(&mut self, index: usize, chunk: Chunk) {
        self.completed += 1;
        if chunk.is_empty() {
            return;
        }
        self.bounds.merge(&chunk.bounds);
        self.slots.insert(index, chunk);
    }

    fn skip(&mut self) {
        self.completed += 1;
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f32 / self.total as f32).clamp(0.0, 1.0)
    }

    fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

enum Decoder {
    Inline,
    Pool {
        pool: DecodeWorkerPool,
        pending: Vec<PendingChunk>,
        max_pending: usize,
    },
}

pub struct StreamSession<S> {
    source: S,
    header: LasHeader,
    config: StreamConfig,
    layout: RecordLayout,
    origin: [f64; 3],
    plans: Vec<ChunkPlan>,
    next_plan: usize,
    assembler: ChunkAssembler,
    truncation: Option<TruncatedData>,
    cancel: CancellationToken,
    decoder: Decoder,
}

/// Read and decode the header from the start of `source`.
pub fn read_header<S: ChunkSource + ?Sized>(source: &mut S) -> LoadResult<LasHeader> {
    let file_size = source.size();
    let header_len = (HEADER_SIZE as u64).min(file_size);
    let bytes = read_with_fallback(source, 0, header_len, StreamConfig::default().read_limits())?;
    let mut header = decode_header(&bytes)?;
    header.resolve_point_count(file_size);
    Ok(header)
}

impl<S: ChunkSource> StreamSession<S> {
    /// Read the header and plan the chunks, decoding inline.
    pub fn open(mut source: S, config: StreamConfig) -> LoadResult<Self> {
        let header = read_header(&mut source)?;
        Self::with_header(source, header, config)
    }

    /// Plan chunks for an already decoded header.
    pub fn with_header(source: S, mut header: LasHeader, config: StreamConfig) -> LoadResult<Self> {
        config.validate()?;
        let file_size = source.size();
        header.resolve_point_count(file_size);

        let truncation = header.check_truncation(file_size);
        if let Some(truncation) = truncation {
            tracing::warn!(
                declared = truncation.declared,
                available = truncation.available,
                "header declares more points than the file holds"
            );
        }

        let origin = if config.recenter { header.offset } else { [0.0; 3] };
        let layout = RecordLayout::new(&header, origin, config.keep_intensity);
        let plans = plan_chunks(&header, file_size, config.points_per_chunk);
        tracing::info!(
            version = %header.version,
            format = header.point_data_format,
            record_length = header.point_data_record_length,
            points = header.number_of_points,
            chunks = plans.len(),
            "planned LAS stream"
        );

        Ok(Self {
            source,
            header,
            assembler: ChunkAssembler::new(plans.len()),
            config,
            layout,
            origin,
            plans,
            next_plan: 0,
            truncation,
            cancel: CancellationToken::new(),
            decoder: Decoder::Inline,
        })
    }

    /// Decode on `pool` instead of inline. At most twice the pool's worker
    /// count of chunks are held in memory waiting for a worker.
    pub fn with_pool(mut self, pool: DecodeWorkerPool) -> Self {
        let max_pending = pool.max_workers() * 2;
        self.decoder = Decoder::Pool {
            pool,
            pending: Vec::new(),
            max_pending,
        };
        self
    }

    pub fn header(&self) -> &LasHeader {
        &self.header
    }

    pub fn plans(&self) -> &[ChunkPlan] {
        &self.plans
    }

    pub fn truncation(&self) -> Option<TruncatedData> {
        self.truncation
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if let Decoder::Pool { pool, .. } = &mut self.decoder {
            pool.terminate();
        }
    }

    pub fn progress(&self) -> f32 {
        self.assembler.progress()
    }

    pub fn is_finished(&self) -> bool {
        self.assembler.is_complete()
    }

    /// Chunks decoded so far, including skipped empty ranges.
    pub fn completed_chunks(&self) -> usize {
        self.assembler.completed
    }

    /// Do one bounded unit of work: up to `chunks_per_tick` reads, plus
    /// collecting whatever pooled decodes have finished.
    pub fn tick(&mut self) -> LoadResult<StreamStep> {
        if self.cancel.is_cancelled() {
            self.cancel();
            return Err(LoadError::Cancelled);
        }

        for _ in 0..self.config.chunks_per_tick {
            if !self.dispatch_next()? {
                break;
            }
        }
        self.collect_ready()?;

        if self.assembler.is_complete() {
            Ok(StreamStep::Finished)
        } else {
            Ok(StreamStep::Pending {
                progress: self.assembler.progress(),
            })
        }
    }

    /// Read and hand off the next planned chunk. Returns false when nothing
    /// was dispatched, either because the plan is exhausted or the pool is full.
    fn dispatch_next(&mut self) -> LoadResult<bool> {
        if self.pool_is_full() {
            return Ok(false);
        }
        let Some(plan) = self.plans.get(self.next_plan).copied() else {
            return Ok(false);
        };
        self.next_plan += 1;

        if plan.is_empty() {
            tracing::debug!(chunk = plan.index, "skipping chunk past end of file");
            self.assembler.skip();
            return Ok(true);
        }

        let bytes = read_with_fallback(
            &mut self.source,
            plan.byte_start,
            plan.byte_end,
            self.config.read_limits(),
        )?;

        match &mut self.decoder {
            Decoder::Inline => {
                let requested = usize::try_from(plan.point_count).unwrap_or(usize::MAX);
                let chunk = decode_records(&bytes, &self.layout, requested, plan.start_point);
                tracing::trace!(chunk = plan.index, points = chunk.count, "decoded chunk");
                self.assembler.accept(plan.index, chunk);
            }
            Decoder::Pool { pool, pending, .. } => {
                pending.push(pool.submit(ChunkTask::new(&plan, bytes, self.layout)));
            }
        }
        Ok(true)
    }

    fn collect_ready(&mut self) -> LoadResult<()> {
        let Decoder::Pool { pool, pending, .. } = &mut self.decoder else {
            return Ok(());
        };

        let mut failure = None;
        let mut index = 0;
        while index < pending.len() {
            match pending[index].try_take() {
                Some(result) => {
                    let finished = pending.swap_remove(index);
                    match result {
                        Ok(chunk) => self.assembler.accept(finished.index(), chunk),
                        Err(error) => {
                            failure.get_or_insert(error);
                        }
                    }
                }
                None => index += 1,
            }
        }

        if let Some(error) = failure {
            pool.terminate();
            pending.clear();
            return Err(error.into());
        }
        Ok(())
    }

    /// Block until at least one pooled decode has finished.
    fn wait_for_any(&mut self) -> LoadResult<()> {
        let Decoder::Pool { pool, pending, .. } = &mut self.decoder else {
            return Ok(());
        };
        if pending.is_empty() {
            return Ok(());
        }
        let oldest = pending.remove(0);
        let index = oldest.index();
        match oldest.wait() {
            Ok(chunk) => {
                self.assembler.accept(index, chunk);
                Ok(())
            }
            Err(error) => {
                pool.terminate();
                pending.clear();
                Err(error.into())
            }
        }
    }

    /// Drive the session to completion on the current thread.
    pub fn run(mut self, mut on_progress: impl FnMut(f32)) -> LoadResult<StreamResult> {
        if self.plans.is_empty() {
            on_progress(1.0);
        }
        let mut reported = 0;
        loop {
            let step = self.tick()?;
            if self.assembler.completed > reported {
                reported = self.assembler.completed;
                on_progress(self.assembler.progress());
            }
            match step {
                StreamStep::Finished => break,
                StreamStep::Pending { .. } => {
                    if self.next_plan >= self.plans.len() || self.pool_is_full() {
                        self.wait_for_any()?;
                    }
                }
            }
        }
        if self.assembler.completed > reported {
            on_progress(self.assembler.progress());
        }
        Ok(self.finish())
    }

    fn pool_is_full(&self) -> bool {
        matches!(
            &self.decoder,
            Decoder::Pool { pending, max_pending, .. } if pending.len() >= *max_pending
        )
    }

    /// Hand over everything decoded so far. Outstanding pooled decodes are dropped.
    pub fn finish(mut self) -> StreamResult {
        if let Decoder::Pool { pool, .. } = &mut self.decoder {
            pool.terminate();
        }
        let assembler = std::mem::take(&mut self.assembler);
        tracing::info!(
            chunks = assembler.slots.len(),
            points = assembler.slots.values().map(|chunk| chunk.count as u64).sum::<u64>(),
            "stream finished"
        );
        StreamResult {
            header: self.header,
            chunks: assembler.slots.into_values().collect(),
            bounds: assembler.bounds,
            origin: self.origin,
            truncation: self.truncation,
        }
    }
}

/// Stream every chunk of `source`, decoding inline on the calling thread.
pub fn stream_chunks<S: ChunkSource>(
    source: S,
    config: StreamConfig,
    on_progress: impl FnMut(f32),
) -> LoadResult<StreamResult> {
    StreamSession::open(source, config)?.run(on_progress)
}

/// Stream every chunk of `source`, decoding on a pool of `config.max_workers` threads.
pub fn stream_chunks_parallel<S: ChunkSource>(
    source: S,
    config: StreamConfig,
    on_progress: impl FnMut(f32),
) -> LoadResult<StreamResult> {
    let pool = DecodeWorkerPool::new(config.max_workers)?;
    StreamSession::open(source, config)?
        .with_pool(pool)
        .run(on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::synthetic::SyntheticLas;

    fn config(points_per_chunk: u64) -> StreamConfig {
        StreamConfig {
            points_per_chunk,
            max_workers: 3,
            ..StreamConfig::default()
        }
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let bytes = SyntheticLas::new(10_500).to_bytes();
        let mut seen = Vec::new();
        let result = stream_chunks(MemorySource::new(bytes), config(1_000), |p| seen.push(p)).unwrap();

        assert_eq!(result.total_points(), 10_500);
        assert_eq!(result.chunks.len(), 11);
        assert_eq!(seen.len(), 11);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen.last().copied(), Some(1.0));
    }

    #[test]
    fn ticks_yield_one_chunk_at_a_time() {
        let bytes = SyntheticLas::new(3_000).to_bytes();
        let mut session = StreamSession::open(MemorySource::new(bytes), config(1_000)).unwrap();

        assert_eq!(session.tick().unwrap(), StreamStep::Pending { progress: 1.0 / 3.0 });
        assert_eq!(session.tick().unwrap(), StreamStep::Pending { progress: 2.0 / 3.0 });
        assert_eq!(session.tick().unwrap(), StreamStep::Finished);
        assert_eq!(session.finish().chunks.len(), 3);
    }

    #[test]
    fn cancellation_stops_at_next_tick() {
        let bytes = SyntheticLas::new(5_000).to_bytes();
        let mut session = StreamSession::open(MemorySource::new(bytes), config(1_000)).unwrap();
        let token = session.cancellation();

        session.tick().unwrap();
        token.cancel();
        assert!(matches!(session.tick(), Err(LoadError::Cancelled)));
        assert_eq!(session.completed_chunks(), 1);
    }

    #[test]
    fn parallel_result_matches_sequential_order() {
        let bytes = SyntheticLas::new(25_001).point_format(3).to_bytes();
        let sequential = stream_chunks(MemorySource::new(bytes.clone()), config(2_000), |_| {}).unwrap();
        let parallel = stream_chunks_parallel(MemorySource::new(bytes), config(2_000), |_| {}).unwrap();

        assert_eq!(parallel.chunks.len(), 13);
        assert_eq!(parallel.chunks, sequential.chunks);
        assert_eq!(parallel.bounds, sequential.bounds);
    }

    #[test]
    fn recentering_subtracts_the_coordinate_offset() {
        let synthetic = SyntheticLas::new(10).offset([1_000_000.0, 2_000_000.0, 50.0]);
        let mut cfg = config(100);
        cfg.recenter = true;
        let result = stream_chunks(MemorySource::new(synthetic.to_bytes()), cfg, |_| {}).unwrap();

        assert_eq!(result.origin, [1_000_000.0, 2_000_000.0, 50.0]);
        let [x, _, _] = result.chunks[0].position(3);
        let expected = synthetic.point(3).raw[0] as f64 * synthetic.header().scale[0];
        assert!((f64::from(x) - expected).abs() < 1e-4);
        assert!(result.bounds.min_x >= 1_000_000.0);
    }

    #[test]
    fn empty_file_reports_completion() {
        let bytes = SyntheticLas::new(0).to_bytes();
        let mut seen = Vec::new();
        let result = stream_chunks(MemorySource::new(bytes), config(1_000), |p| seen.push(p)).unwrap();
        assert!(result.chunks.is_empty());
        assert_eq!(seen, vec![1.0]);
    }
}
