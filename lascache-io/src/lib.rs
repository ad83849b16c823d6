//! I/O operations for LAS point clouds and pcache output
//!
//! This crate provides the binary LAS header codec, a cancellable streaming
//! point decoder, and a writer for the ASCII pcache point-cache format.

pub mod error;
pub mod las;
pub mod pcache;
pub mod stream;

pub use error::*;
pub use las::{decode_header, encode_header, LasHeader, HEADER_SIZE};
pub use pcache::{format_coord, PcacheWriter, PCACHE_EXTENSION};
pub use stream::{first_point, stream_points, READER_BATCH_SIZE};
