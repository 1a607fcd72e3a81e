/// Points decoded per chunk unless configured otherwise.
pub const DEFAULT_POINTS_PER_CHUNK: u64 = 200_000;

/// Reads above this size fall back to part-by-part reads after a failure.
pub const LARGE_READ_THRESHOLD: u64 = 10 * 1024 * 1024;
pub const READ_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Upper bound on decode workers when hardware parallelism is detected.
pub const MAX_DEFAULT_WORKERS: usize = 8;
/// Worker count used when hardware parallelism cannot be queried.
pub const FALLBACK_WORKERS: usize = 4;

/// Chunks processed per frame before yielding back to the render loop.
pub const DEFAULT_CHUNKS_PER_TICK: usize = 1;
/// Chunk entities spawned per frame once streaming is done.
pub const SPAWN_CHUNKS_PER_FRAME: usize = 5;
