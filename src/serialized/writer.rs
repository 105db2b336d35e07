//! Appending mesh records to a serialized container.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{record_flags, FORMAT_MAGIC, FORMAT_VERSION};
use crate::error::{ExportError, Result};
use crate::mesher::MeshRecord;

/// How a record's payload is fed to the compressor.
///
/// Both strategies produce the same uncompressed layout; they only differ in
/// memory use and in how many calls reach the deflate stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordEncoding {
    /// Write each field straight into the compressor.
    #[default]
    Streaming,
    /// Assemble the payload in memory, then compress it in one call.
    Buffered,
}

/// Counts bytes passing through to the inner writer.
struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Single-owner writer for one container.
pub struct SerializedWriter<W: Write> {
    out: W,
    position: u64,
    offsets: Vec<u64>,
    compression: Compression,
    encoding: RecordEncoding,
}

impl<W: Write> SerializedWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_options(out, 6, RecordEncoding::default())
    }

    /// Create a writer with a deflate level (clamped to 0..=9) and strategy.
    pub fn with_options(out: W, level: u32, encoding: RecordEncoding) -> Self {
        Self {
            out,
            position: 0,
            offsets: Vec::new(),
            compression: Compression::new(level.min(9)),
            encoding,
        }
    }

    /// Append a record; returns its byte offset. Its shape index is
    /// `record_count() - 1` afterwards.
    pub fn write_record(&mut self, record: &MeshRecord) -> Result<u64> {
        record.validate()?;
        if self.offsets.len() == u32::MAX as usize {
            return Err(ExportError::InvalidContainer(
                "record count exceeds u32".to_string(),
            ));
        }

        let offset = self.position;
        let mut counter = CountingWriter {
            inner: &mut self.out,
            count: 0,
        };
        counter.write_all(&FORMAT_MAGIC.to_le_bytes())?;
        counter.write_all(&FORMAT_VERSION.to_le_bytes())?;

        let mut encoder = ZlibEncoder::new(&mut counter, self.compression);
        match self.encoding {
            RecordEncoding::Streaming => write_payload(&mut encoder, record)?,
            RecordEncoding::Buffered => {
                let mut payload = Vec::with_capacity(payload_len(record));
                write_payload(&mut payload, record)?;
                encoder.write_all(&payload)?;
            }
        }
        encoder.finish()?;

        self.position += counter.count;
        self.offsets.push(offset);
        log::debug!(
            "serialized '{}' at {} ({} vertices, {} triangles)",
            record.name,
            offset,
            record.vertex_count(),
            record.triangle_count()
        );
        Ok(offset)
    }

    pub fn record_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Write the trailer and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        for offset in &self.offsets {
            self.out.write_all(&offset.to_le_bytes())?;
        }
        self.out
            .write_all(&(self.offsets.len() as u32).to_le_bytes())?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Uncompressed payload size in bytes.
fn payload_len(record: &MeshRecord) -> usize {
    let n = record.vertex_count();
    let mut len = 4 + record.name.len() + 1 + 16 + n * 24 + record.triangle_count() * 12;
    if record.normals.is_some() {
        len += n * 24;
    }
    if record.uvs.is_some() {
        len += n * 16;
    }
    if record.vertex_colors.is_some() {
        len += n * 24;
    }
    len
}

fn write_payload<S: Write>(sink: &mut S, record: &MeshRecord) -> std::io::Result<()> {
    sink.write_all(&record_flags(record).to_le_bytes())?;
    sink.write_all(record.name.as_bytes())?;
    sink.write_all(&[0])?;
    sink.write_all(&(record.vertex_count() as u64).to_le_bytes())?;
    sink.write_all(&(record.triangle_count() as u64).to_le_bytes())?;

    write_floats(sink, record.positions.iter().flatten())?;
    if let Some(normals) = &record.normals {
        write_floats(sink, normals.iter().flatten())?;
    }
    if let Some(uvs) = &record.uvs {
        write_floats(sink, uvs.iter().flatten())?;
    }
    if let Some(colors) = &record.vertex_colors {
        write_floats(sink, colors.iter().flatten())?;
    }
    for index in record.indices.iter().flatten() {
        sink.write_all(&index.to_le_bytes())?;
    }
    Ok(())
}

fn write_floats<'a, S: Write>(
    sink: &mut S,
    values: impl Iterator<Item = &'a f64>,
) -> std::io::Result<()> {
    for value in values {
        sink.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::Vertex;
    use crate::serialized::SerializedReader;

    fn triangle(name: &str) -> MeshRecord {
        let mut record = MeshRecord::new(name);
        record.add_vertex(Vertex::new([0.0, 0.0, 0.0]).with_uv([0.0, 0.0]));
        record.add_vertex(Vertex::new([1.0, 0.0, 0.0]).with_uv([1.0, 0.0]));
        record.add_vertex(Vertex::new([0.0, 1.0, 0.0]).with_uv([0.0, 1.0]));
        record.add_triangle(0, 1, 2);
        record
    }

    #[test]
    fn test_offsets_and_headers() {
        let mut writer = SerializedWriter::new(Vec::new());
        for i in 0..4 {
            writer.write_record(&triangle(&format!("tri{}", i))).unwrap();
        }
        let offsets = writer.offsets().to_vec();
        let data = writer.finish().unwrap();

        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));

        let count = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap());
        assert_eq!(count, 4);
        let trailer = &data[data.len() - 4 - 32..data.len() - 4];
        for (i, chunk) in trailer.chunks(8).enumerate() {
            let offset = u64::from_le_bytes(chunk.try_into().unwrap());
            assert_eq!(offset, offsets[i]);
            let at = offset as usize;
            assert_eq!(u16::from_le_bytes([data[at], data[at + 1]]), FORMAT_MAGIC);
            assert_eq!(u16::from_le_bytes([data[at + 2], data[at + 3]]), FORMAT_VERSION);
        }
    }

    #[test]
    fn test_empty_container_trailer() {
        let data = SerializedWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_strategies_decode_identically() {
        let record = triangle("same");
        let mut streaming = SerializedWriter::with_options(Vec::new(), 6, RecordEncoding::Streaming);
        let mut buffered = SerializedWriter::with_options(Vec::new(), 6, RecordEncoding::Buffered);
        streaming.write_record(&record).unwrap();
        buffered.write_record(&record).unwrap();
        let a = streaming.finish().unwrap();
        let b = buffered.finish().unwrap();

        let a = SerializedReader::from_bytes(&a).unwrap().read_record(0).unwrap();
        let b = SerializedReader::from_bytes(&b).unwrap().read_record(0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, record);
    }

    #[test]
    fn test_payload_len_matches() {
        let record = triangle("len");
        let mut payload = Vec::new();
        write_payload(&mut payload, &record).unwrap();
        assert_eq!(payload.len(), payload_len(&record));
    }

    #[test]
    fn test_rejects_invalid_record() {
        let mut writer = SerializedWriter::new(Vec::new());
        let mut record = triangle("bad\0name");
        assert!(writer.write_record(&record).is_err());
        record.name = "ok".into();
        record.indices.push([0, 1, 7]);
        assert!(writer.write_record(&record).is_err());
        assert_eq!(writer.record_count(), 0);
    }
}
