/* Framed record transport: turns the raw byte stream into sentinel
terminated records and back. */

pub mod reader;
pub mod writer;

pub use reader::{FrameReader, RecordReader};
pub use writer::RecordWriter;

/// How many bytes each socket read asks for. Records are tiny; a small
/// chunk keeps the leftover buffer bounded by one record plus a chunk.
pub(crate) const CHUNK_SIZE: usize = 8;
