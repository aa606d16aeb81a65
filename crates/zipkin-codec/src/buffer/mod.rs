//! Bounds-checked byte cursors shared by every format.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::{
    ascii_size_in_bytes, varint_size_u32, varint_size_u64, write_exact, write_exact_into,
    WriteBuffer, Writer,
};
