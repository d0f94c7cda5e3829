use super::{ReadOptions, Source};
use crate::pool::{BufferPool, PooledBuf};
use std::{
    fs::File,
    io::{self, Read as _, Seek as _, SeekFrom},
    path::Path,
};
use tracing::{debug, trace};

/// A [Source] reading a byte range of a file with blocking I/O.
pub struct FileSource {
    file: File,
    /// Offset of the first byte of the range.
    start: u64,
    /// Offset of the next byte to read.
    position: u64,
    /// Offset one past the last byte of the range.
    end: u64,
    logged_checksums: bool,
}

impl FileSource {
    /// Creates a source over `limit` bytes of `file` starting at `offset`.
    pub fn new(file: File, offset: u64, limit: u64) -> Self {
        Self {
            file,
            start: offset,
            position: offset,
            end: offset.saturating_add(limit),
            logged_checksums: false,
        }
    }

    /// Opens the file at `path` as a source over its entire contents.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(file, 0, len))
    }

    /// Returns the offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the number of bytes left in the range.
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }
}

impl Source for FileSource {
    fn read_chunk(
        &mut self,
        pool: &BufferPool,
        max: usize,
        options: ReadOptions,
    ) -> io::Result<Option<PooledBuf>> {
        if options.skip_checksums && !self.logged_checksums {
            debug!("file source has no checksums to skip");
            self.logged_checksums = true;
        }
        let remaining = self.remaining();
        if remaining == 0 || max == 0 {
            return Ok(None);
        }

        let len = remaining.min(max as u64) as usize;
        let mut chunk = pool.alloc(len);
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.read_exact(&mut chunk.spare_mut()[..len])?;
        chunk.commit(len);
        self.position += len as u64;
        Ok(Some(chunk))
    }

    fn release_chunk(&mut self, chunk: PooledBuf) {
        let unread = chunk.len() as u64;
        if unread > 0 {
            self.position = self.position.saturating_sub(unread).max(self.start);
            trace!(unread, position = self.position, "rewound file source");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;
    use prometheus_client::registry::Registry;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::env;

    fn pool() -> BufferPool {
        BufferPool::new(Default::default(), &mut Registry::default())
    }

    fn temp_file(contents: &[u8]) -> std::path::PathBuf {
        let mut rng = StdRng::from_entropy();
        let path = env::temp_dir().join(format!("file_source_{}", rng.gen::<u64>()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_range_in_chunks() {
        let path = temp_file(b"0123456789");
        let file = File::open(&path).unwrap();
        let mut source = FileSource::new(file, 2, 7);
        let pool = pool();
        let options = ReadOptions::default();

        for expected in [&b"234"[..], b"567", b"8"] {
            let mut chunk = source.read_chunk(&pool, 3, options).unwrap().unwrap();
            assert_eq!(chunk.as_ref(), expected);
            chunk.advance(chunk.len());
            source.release_chunk(chunk);
        }
        assert_eq!(source.remaining(), 0);
        assert!(source.read_chunk(&pool, 3, options).unwrap().is_none());
        assert_eq!(pool.stats().outstanding, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_release_rewinds_unread() {
        let path = temp_file(b"abcdef");
        let mut source = FileSource::open(&path).unwrap();
        let pool = pool();
        let options = ReadOptions::default();

        let mut chunk = source.read_chunk(&pool, 4, options).unwrap().unwrap();
        chunk.advance(1);
        source.release_chunk(chunk);
        assert_eq!(source.position(), 1);

        let chunk = source.read_chunk(&pool, 10, options).unwrap().unwrap();
        assert_eq!(chunk.as_ref(), b"bcdef");
        assert_eq!(source.remaining(), 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_range_past_end_of_file() {
        let path = temp_file(b"abc");
        let file = File::open(&path).unwrap();
        let mut source = FileSource::new(file, 1, 10);
        let pool = pool();

        let err = source
            .read_chunk(&pool, 16, ReadOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let _ = std::fs::remove_file(&path);
    }
}
