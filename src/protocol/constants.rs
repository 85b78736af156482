//! Wire constants

/// Size of the big-endian length prefix in front of every frame
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default upper bound on a single frame payload (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Initial read buffer size
pub const READ_BUFFER_SIZE: usize = 16 * 1024;
