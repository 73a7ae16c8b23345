use std::io::Write;

use super::FrameSink;
use crate::error::CaptureResult;

/// [`FrameSink`] over any blocking [`Write`].
pub struct StreamSink<W: Write> {
    writer: W,
    frames: u64,
    bytes: u64,
}

/// In-memory sink; the stream is inspectable through [`StreamSink::get_ref`].
pub type MemorySink = StreamSink<Vec<u8>>;

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames: 0,
            bytes: 0,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Flushes and returns the writer.
    pub fn into_inner(mut self) -> CaptureResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl MemorySink {
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: Write> FrameSink for StreamSink<W> {
    fn write_planes(&mut self, y: &[u8], u: &[u8], v: &[u8]) -> CaptureResult<()> {
        for plane in [y, u, v] {
            self.writer.write_all(plane)?;
        }
        self.frames += 1;
        self.bytes += (y.len() + u.len() + v.len()) as u64;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }

    fn finish(mut self) -> CaptureResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planes_are_concatenated_in_order_without_framing() {
        let mut sink = MemorySink::in_memory();
        sink.write_planes(&[1, 1, 1, 1], &[2], &[3]).unwrap();
        sink.write_planes(&[4, 4, 4, 4], &[5], &[6]).unwrap();
        assert_eq!(sink.get_ref(), &vec![1, 1, 1, 1, 2, 3, 4, 4, 4, 4, 5, 6]);
    }

    #[test]
    fn counters_track_frames_and_bytes() {
        let mut sink = MemorySink::in_memory();
        for _ in 0..3 {
            sink.write_planes(&[0; 16], &[0; 4], &[0; 4]).unwrap();
        }
        assert_eq!(sink.frames_written(), 3);
        assert_eq!(sink.bytes_written(), 3 * 24);
        assert_eq!(sink.into_inner().unwrap().len(), 72);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_propagate_and_do_not_count() {
        let mut sink = StreamSink::new(FailingWriter);
        assert!(sink.write_planes(&[1], &[2], &[3]).is_err());
        assert_eq!(sink.frames_written(), 0);
        assert_eq!(sink.bytes_written(), 0);
    }
}
