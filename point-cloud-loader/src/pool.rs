//! Bounded pool of decode workers.
//!
//! Tasks are queued FIFO on a rayon pool with exactly `max_workers` threads,
//! so at most that many decodes run at once. Each task owns its bytes and
//! answers on its own single-slot channel, which makes every submission
//! resolve or reject exactly once. A panicking task poisons the pool: every
//! task that has not started yet is rejected with
//! [`DecodeTaskError::Cancelled`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_channel::{Receiver, Sender, TryRecvError};

use crate::chunk::{Chunk, ChunkPlan};
use crate::error::{DecodeTaskError, LoadResult};
use crate::record::{RecordLayout, decode_records};

/// One chunk's bytes plus what is needed to decode them.
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub index: usize,
    pub bytes: Vec<u8>,
    pub layout: RecordLayout,
    pub requested: usize,
    pub first_point: u64,
}

impl ChunkTask {
    pub fn new(plan: &ChunkPlan, bytes: Vec<u8>, layout: RecordLayout) -> Self {
        Self {
            index: plan.index,
            bytes,
            layout,
            requested: usize::try_from(plan.point_count).unwrap_or(usize::MAX),
            first_point: plan.start_point,
        }
    }

    pub fn decode(&self) -> Chunk {
        decode_records(&self.bytes, &self.layout, self.requested, self.first_point)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    running: AtomicUsize,
    peak_running: AtomicUsize,
    queued: AtomicUsize,
    terminated: AtomicBool,
    poisoned: AtomicBool,
}

impl PoolState {
    fn accepting(&self) -> bool {
        !self.terminated.load(Ordering::Acquire) && !self.poisoned.load(Ordering::Acquire)
    }
}

type TaskResult = Result<Chunk, DecodeTaskError>;

/// Handle to a submitted task's eventual result.
#[derive(Debug)]
pub struct PendingChunk {
    index: usize,
    receiver: Receiver<TaskResult>,
}

impl PendingChunk {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Non-blocking poll. Returns `Some` once; drop the handle afterwards.
    pub fn try_take(&self) -> Option<TaskResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(DecodeTaskError::Disconnected {
                chunk_index: self.index,
            })),
        }
    }

    /// Block the calling thread until the task settles.
    pub fn wait(self) -> TaskResult {
        self.receiver
            .recv_blocking()
            .unwrap_or(Err(DecodeTaskError::Disconnected {
                chunk_index: self.index,
            }))
    }

    /// Await the task's result from any executor.
    pub async fn resolve(self) -> TaskResult {
        self.receiver
            .recv()
            .await
            .unwrap_or(Err(DecodeTaskError::Disconnected {
                chunk_index: self.index,
            }))
    }
}

pub struct DecodeWorkerPool {
    threads: Option<rayon::ThreadPool>,
    max_workers: usize,
    state: Arc<PoolState>,
}

impl std::fmt::Debug for DecodeWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeWorkerPool")
            .field("max_workers", &self.max_workers)
            .field("state", &self.state)
            .finish()
    }
}

fn reject(sender: &Sender<TaskResult>, index: usize) {
    let _ = sender.try_send(Err(DecodeTaskError::Cancelled { chunk_index: index }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl DecodeWorkerPool {
    pub fn new(max_workers: usize) -> LoadResult<Self> {
        let max_workers = max_workers.max(1);
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|index| format!("las-decode-{index}"))
            .build()?;
        tracing::debug!(max_workers, "decode worker pool started");
        Ok(Self {
            threads: Some(threads),
            max_workers,
            state: Arc::new(PoolState::default()),
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Tasks currently decoding.
    pub fn running(&self) -> usize {
        self.state.running.load(Ordering::Acquire)
    }

    /// Highest number of tasks that were ever decoding at the same time.
    pub fn peak_running(&self) -> usize {
        self.state.peak_running.load(Ordering::Acquire)
    }

    /// Tasks submitted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.state.queued.load(Ordering::Acquire)
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.poisoned.load(Ordering::Acquire)
    }

    pub fn is_terminated(&self) -> bool {
        self.threads.is_none()
    }

    pub fn submit(&self, task: ChunkTask) -> PendingChunk {
        let index = task.index;
        self.dispatch(index, move || task.decode())
    }

    fn dispatch<F>(&self, index: usize, job: F) -> PendingChunk
    where
        F: FnOnce() -> Chunk + Send + 'static,
    {
        let (sender, receiver) = async_channel::bounded(1);
        let pending = PendingChunk { index, receiver };

        let Some(threads) = self.threads.as_ref().filter(|_| self.state.accepting()) else {
            reject(&sender, index);
            return pending;
        };

        let state = Arc::clone(&self.state);
        state.queued.fetch_add(1, Ordering::AcqRel);
        threads.spawn_fifo(move || {
            state.queued.fetch_sub(1, Ordering::AcqRel);
            if !state.accepting() {
                reject(&sender, index);
                return;
            }

            let running = state.running.fetch_add(1, Ordering::AcqRel) + 1;
            state.peak_running.fetch_max(running, Ordering::AcqRel);
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            state.running.fetch_sub(1, Ordering::AcqRel);

            let result = outcome.map_err(|payload| {
                state.poisoned.store(true, Ordering::Release);
                let message = panic_message(payload.as_ref());
                tracing::error!(chunk_index = index, %message, "decode task panicked");
                DecodeTaskError::Panicked {
                    chunk_index: index,
                    message,
                }
            });
            let _ = sender.try_send(result);
        });
        pending
    }

    /// Reject every task that has not started and release the worker threads.
    ///
    /// Running tasks finish and still deliver their result. Calling this
    /// more than once is harmless.
    pub fn terminate(&mut self) {
        self.state.terminated.store(true, Ordering::Release);
        if self.threads.take().is_some() {
            tracing::debug!(queued = self.queued(), "decode worker pool terminated");
        }
    }
}

impl Drop for DecodeWorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::header::{LasHeader, Version};
    use crate::bounds::Bounds;

    fn layout() -> RecordLayout {
        let header = LasHeader {
            version: Version::new(1, 2),
            offset_to_point_data: 227,
            point_data_format: 0,
            point_data_record_length: 20,
            legacy_point_count: 0,
            extended_point_count: 0,
            number_of_points: 0,
            scale: [1.0; 3],
            offset: [0.0; 3],
            bounds: Bounds::new(),
        };
        RecordLayout::from_header(&header)
    }

    fn task(index: usize, points: usize) -> ChunkTask {
        let mut bytes = vec![0u8; points * 20];
        for (i, record) in bytes.chunks_exact_mut(20).enumerate() {
            record[..4].copy_from_slice(&(i as i32).to_le_bytes());
        }
        ChunkTask {
            index,
            bytes,
            layout: layout(),
            requested: points,
            first_point: (index * points) as u64,
        }
    }

    #[test]
    fn every_task_settles_once_and_concurrency_is_bounded() {
        let pool = DecodeWorkerPool::new(2).unwrap();
        let pending: Vec<_> = (0..12).map(|index| pool.submit(task(index, 20_000))).collect();

        for (index, pending) in pending.into_iter().enumerate() {
            assert_eq!(pending.index(), index);
            let chunk = pending.wait().unwrap();
            assert_eq!(chunk.count, 20_000);
            assert_eq!(chunk.first_point, (index * 20_000) as u64);
        }
        assert!(pool.peak_running() <= 2);
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn terminate_rejects_tasks_that_have_not_started() {
        let mut pool = DecodeWorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let blocker = pool.dispatch(0, move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Chunk::empty(0)
        });
        started_rx.recv().unwrap();
        let queued: Vec<_> = (1..6).map(|index| pool.submit(task(index, 10))).collect();

        pool.terminate();
        release_tx.send(()).unwrap();

        assert_eq!(blocker.wait(), Ok(Chunk::empty(0)));
        for pending in queued {
            let index = pending.index();
            assert_eq!(
                pending.wait(),
                Err(DecodeTaskError::Cancelled { chunk_index: index })
            );
        }
        assert!(pool.is_terminated());
        assert_eq!(
            pool.submit(task(9, 10)).wait(),
            Err(DecodeTaskError::Cancelled { chunk_index: 9 })
        );
    }

    #[test]
    fn panic_poisons_the_pool() {
        let pool = DecodeWorkerPool::new(1).unwrap();
        let failing = pool.dispatch(3, || panic!("corrupt chunk"));

        assert_eq!(
            failing.wait(),
            Err(DecodeTaskError::Panicked {
                chunk_index: 3,
                message: "corrupt chunk".to_string()
            })
        );
        assert!(pool.is_poisoned());
        assert_eq!(
            pool.submit(task(4, 10)).wait(),
            Err(DecodeTaskError::Cancelled { chunk_index: 4 })
        );
    }

    #[test]
    fn resolve_awaits_decoded_and_rejected_tasks() {
        let mut pool = DecodeWorkerPool::new(1).unwrap();
        let chunk = pollster::block_on(pool.submit(task(2, 50)).resolve()).unwrap();
        assert_eq!(chunk.count, 50);
        assert_eq!(chunk.first_point, 100);

        pool.terminate();
        assert_eq!(
            pollster::block_on(pool.submit(task(3, 50)).resolve()),
            Err(DecodeTaskError::Cancelled { chunk_index: 3 })
        );
    }

    #[test]
    fn try_take_polls_without_blocking() {
        let pool = DecodeWorkerPool::new(1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let pending = pool.dispatch(0, move || {
            release_rx.recv().unwrap();
            Chunk::empty(7)
        });

        assert!(pending.try_take().is_none());
        release_tx.send(()).unwrap();
        loop {
            if let Some(result) = pending.try_take() {
                assert_eq!(result, Ok(Chunk::empty(7)));
                break;
            }
            std::thread::yield_now();
        }
    }
}
