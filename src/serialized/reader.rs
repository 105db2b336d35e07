//! Random-access reading of serialized containers.

use std::io::{ErrorKind, Read};

use flate2::read::ZlibDecoder;

use super::{
    FLAG_DOUBLE_PRECISION, FLAG_TEXCOORDS, FLAG_VERTEX_COLORS, FLAG_VERTEX_NORMALS,
    FORMAT_MAGIC, FORMAT_VERSION,
};
use crate::error::{ExportError, Result};
use crate::mesher::MeshRecord;

/// A parsed container trailer over borrowed bytes.
#[derive(Debug)]
pub struct SerializedReader<'a> {
    data: &'a [u8],
    offsets: Vec<u64>,
}

impl<'a> SerializedReader<'a> {
    /// Parse the trailer: the last 4 bytes hold the record count, preceded by
    /// one u64 offset per record.
    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(ExportError::InvalidContainer("missing trailer".to_string()));
        }
        let count_at = data.len() - 4;
        let count = u32::from_le_bytes(le_bytes(&data[count_at..])) as usize;
        let table_len = count
            .checked_mul(8)
            .filter(|&len| len <= count_at)
            .ok_or_else(|| {
                ExportError::InvalidContainer(format!("trailer too short for {} records", count))
            })?;
        let table_at = count_at - table_len;

        let offsets: Vec<u64> = data[table_at..count_at]
            .chunks_exact(8)
            .map(|chunk| u64::from_le_bytes(le_bytes(chunk)))
            .collect();

        // Each record holds at least its 4-byte header.
        if offsets
            .windows(2)
            .any(|w| w[0].checked_add(4).map_or(true, |min| w[1] < min))
        {
            return Err(ExportError::InvalidContainer(
                "offsets are not strictly increasing".to_string(),
            ));
        }
        if let Some(&last) = offsets.last() {
            if usize::try_from(last)
                .ok()
                .and_then(|at| at.checked_add(4))
                .map_or(true, |end| end > table_at)
            {
                return Err(ExportError::InvalidContainer(format!(
                    "offset {} points into the trailer",
                    last
                )));
            }
        }

        Ok(Self {
            data: &data[..table_at],
            offsets,
        })
    }

    pub fn record_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Magic and version found at the start of record `index`.
    pub fn header(&self, index: usize) -> Result<(u16, u16)> {
        let at = self.offset(index)?;
        let magic = u16::from_le_bytes(le_bytes(&self.data[at..at + 2]));
        let version = u16::from_le_bytes(le_bytes(&self.data[at + 2..at + 4]));
        Ok((magic, version))
    }

    /// Decode record `index`.
    pub fn read_record(&self, index: usize) -> Result<MeshRecord> {
        let (magic, version) = self.header(index)?;
        if magic != FORMAT_MAGIC || version != FORMAT_VERSION {
            return Err(ExportError::InvalidContainer(format!(
                "record {} has header {:#06x}/{}",
                index, magic, version
            )));
        }
        let start = self.offset(index)? + 4;
        let end = match self.offsets.get(index + 1) {
            Some(&next) => next as usize,
            None => self.data.len(),
        };
        let mut stream = ZlibDecoder::new(&self.data[start..end]);

        let flags = u32::from_le_bytes(read_n(&mut stream)?);
        let name = read_name(&mut stream)?;
        let vertex_count = u64::from_le_bytes(read_n(&mut stream)?) as usize;
        let triangle_count = u64::from_le_bytes(read_n(&mut stream)?) as usize;
        let double = flags & FLAG_DOUBLE_PRECISION != 0;

        let positions = read_tuples::<3>(&mut stream, vertex_count, double)?;
        let normals = (flags & FLAG_VERTEX_NORMALS != 0)
            .then(|| read_tuples::<3>(&mut stream, vertex_count, double))
            .transpose()?;
        let uvs = (flags & FLAG_TEXCOORDS != 0)
            .then(|| read_tuples::<2>(&mut stream, vertex_count, double))
            .transpose()?;
        let vertex_colors = (flags & FLAG_VERTEX_COLORS != 0)
            .then(|| read_tuples::<3>(&mut stream, vertex_count, double))
            .transpose()?;

        let mut indices = Vec::with_capacity(triangle_count.min(PREALLOC_LIMIT));
        for _ in 0..triangle_count {
            let mut tri = [0u32; 3];
            for index in &mut tri {
                *index = u32::from_le_bytes(read_n(&mut stream)?);
            }
            indices.push(tri);
        }

        Ok(MeshRecord {
            name,
            positions,
            normals,
            uvs,
            vertex_colors,
            indices,
        })
    }

    fn offset(&self, index: usize) -> Result<usize> {
        let at = *self.offsets.get(index).ok_or_else(|| {
            ExportError::InvalidContainer(format!(
                "record {} out of range ({} records)",
                index,
                self.offsets.len()
            ))
        })?;
        let at = usize::try_from(at).unwrap_or(usize::MAX);
        if at.checked_add(4).map_or(true, |end| end > self.data.len()) {
            return Err(ExportError::InvalidContainer(format!(
                "record {} header truncated",
                index
            )));
        }
        Ok(at)
    }
}

/// Upper bound on preallocation from counts read out of a record; larger
/// arrays grow as data actually decodes.
const PREALLOC_LIMIT: usize = 1 << 16;

fn le_bytes<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[..N]);
    out
}

fn read_n<const N: usize>(stream: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    stream.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            ExportError::InvalidContainer(format!("record data: {}", e))
        }
        _ => ExportError::Io(e),
    })?;
    Ok(buf)
}

fn read_name(stream: &mut impl Read) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let [byte] = read_n::<1>(stream)?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes)
        .map_err(|e| ExportError::InvalidContainer(format!("record name: {}", e)))
}

fn read_tuples<const N: usize>(
    stream: &mut impl Read,
    count: usize,
    double: bool,
) -> Result<Vec<[f64; N]>> {
    let mut out = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        let mut tuple = [0.0f64; N];
        for value in &mut tuple {
            *value = if double {
                f64::from_le_bytes(read_n(stream)?)
            } else {
                f32::from_le_bytes(read_n(stream)?) as f64
            };
        }
        out.push(tuple);
    }
    Ok(out)
}
