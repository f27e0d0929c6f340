//! Core module: Frame persistence dan bounded values
//!
//! Prinsip desain:
//! - Zero-Copy: frame dibaca langsung dari mmap region
//! - Append-only: frame yang sudah ditulis tidak pernah dipindah
//! - Format frame sama dengan di wire (`[i32 BE len][payload]`)

mod frame_store;
mod stat;

pub use frame_store::{FrameStore, Frames, STORE_HEADER_SIZE};
pub use stat::Stat;
