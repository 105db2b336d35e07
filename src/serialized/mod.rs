//! Mitsuba serialized mesh containers.
//!
//! A container is a sequence of records followed by a trailer:
//!
//! ```text
//! record*  := u16 magic (0x041C) | u16 version (4) | zlib stream
//! stream   := u32 flags | name NUL | u64 vertices | u64 triangles
//!             | positions | normals? | uvs? | colors? | u32 indices
//! trailer  := u64 offset * count | u32 count
//! ```
//!
//! All integers and floats are little-endian.

pub mod reader;
pub mod writer;

pub use reader::SerializedReader;
pub use writer::{RecordEncoding, SerializedWriter};

/// Magic number at the start of every record.
pub const FORMAT_MAGIC: u16 = 0x041C;
/// Container version; version 4 carries record names and 64-bit offsets.
pub const FORMAT_VERSION: u16 = 0x0004;

/// Record flag: per-vertex normals follow the positions.
pub const FLAG_VERTEX_NORMALS: u32 = 0x0001;
/// Record flag: per-vertex UVs are present.
pub const FLAG_TEXCOORDS: u32 = 0x0002;
/// Record flag: per-vertex colors are present.
pub const FLAG_VERTEX_COLORS: u32 = 0x0008;
/// Record flag: the renderer should use face normals.
pub const FLAG_FACE_NORMALS: u32 = 0x0010;
/// Record flag: floats are 4 bytes.
pub const FLAG_SINGLE_PRECISION: u32 = 0x1000;
/// Record flag: floats are 8 bytes.
pub const FLAG_DOUBLE_PRECISION: u32 = 0x2000;

/// Flags describing the attributes of a record. Always double precision.
pub fn record_flags(record: &crate::mesher::MeshRecord) -> u32 {
    let mut flags = FLAG_DOUBLE_PRECISION;
    if record.normals.is_some() {
        flags |= FLAG_VERTEX_NORMALS;
    } else {
        flags |= FLAG_FACE_NORMALS;
    }
    if record.uvs.is_some() {
        flags |= FLAG_TEXCOORDS;
    }
    if record.vertex_colors.is_some() {
        flags |= FLAG_VERTEX_COLORS;
    }
    flags
}
