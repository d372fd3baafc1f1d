//! Byte lookahead cache
//!
//! Wraps a buffered byte source and, while caching is active, records every
//! byte consumed so the tree builder can look at the raw text of the token
//! it just received (CDATA markers, literal element prefixes) without a
//! rewindable stream.
//!
//! The cache is bounded: bytes beyond [`CACHE_CAPACITY`] are read normally
//! but not recorded.

use std::io::{self, BufRead, Read};

/// Maximum number of bytes retained between `start_caching` and `cache()`
pub const CACHE_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct CachedReader<R> {
    inner: R,
    buffer: Vec<u8>,
    caching: bool,
}

impl<R: BufRead> CachedReader<R> {
    pub fn new(inner: R) -> Self {
        CachedReader {
            inner,
            buffer: Vec::with_capacity(CACHE_CAPACITY),
            caching: false,
        }
    }

    /// Clear the cache and start recording consumed bytes.
    pub fn start_caching(&mut self) {
        self.buffer.clear();
        self.caching = true;
    }

    /// Stop recording. The captured bytes stay readable.
    pub fn stop_caching(&mut self) {
        self.caching = false;
    }

    pub fn cache(&self) -> &[u8] {
        &self.buffer
    }

    /// First `min(n, len)` captured bytes.
    pub fn cache_with_limit(&self, n: usize) -> &[u8] {
        &self.buffer[..n.min(self.buffer.len())]
    }

    /// Read a single byte, `Ok(None)` at end of input.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let b = loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => break buf[0],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.inner.consume(1);
        self.record(&[b]);
        Ok(Some(b))
    }

    /// Copy the longest run of bytes that precede any of `stops` into `out`,
    /// without consuming the stop byte. Returns the number of bytes copied.
    ///
    /// Used by the tokenizer to pull text runs out of the buffer in bulk.
    pub fn read_until_any(&mut self, stops: &[u8], out: &mut Vec<u8>) -> io::Result<usize> {
        let mut total = 0;
        loop {
            let (used, done) = {
                let buf = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if buf.is_empty() {
                    return Ok(total);
                }
                let end = find_any(stops, buf);
                let used = end.unwrap_or(buf.len());
                out.extend_from_slice(&buf[..used]);
                if self.caching {
                    let room = CACHE_CAPACITY.saturating_sub(self.buffer.len());
                    self.buffer.extend_from_slice(&buf[..used.min(room)]);
                }
                (used, end.is_some())
            };
            self.inner.consume(used);
            total += used;
            if done {
                return Ok(total);
            }
        }
    }

    fn record(&mut self, bytes: &[u8]) {
        if self.caching {
            let room = CACHE_CAPACITY.saturating_sub(self.buffer.len());
            self.buffer.extend_from_slice(&bytes[..bytes.len().min(room)]);
        }
    }
}

#[inline]
fn find_any(stops: &[u8], haystack: &[u8]) -> Option<usize> {
    match stops {
        [a] => memchr::memchr(*a, haystack),
        [a, b] => memchr::memchr2(*a, *b, haystack),
        [a, b, c] => memchr::memchr3(*a, *b, *c, haystack),
        _ => haystack.iter().position(|b| stops.contains(b)),
    }
}

impl<R: BufRead> Read for CachedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.record(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_caching() {
        let mut r = CachedReader::new(Cursor::new("<AAA>".as_bytes()));
        assert_eq!(r.read_byte().unwrap(), Some(b'<'));

        r.start_caching();
        let mut buf = [0u8; 3];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"AAA");
        assert_eq!(r.cache(), b"AAA");
        assert_eq!(r.cache_with_limit(2), b"AA");
        assert_eq!(r.cache_with_limit(10), b"AAA");

        r.stop_caching();
        assert_eq!(r.read_byte().unwrap(), Some(b'>'));
        assert_eq!(r.cache(), b"AAA");
        assert_eq!(r.read_byte().unwrap(), None);
    }

    #[test]
    fn test_start_resets() {
        let mut r = CachedReader::new(Cursor::new("abcdef".as_bytes()));
        r.start_caching();
        r.read_byte().unwrap();
        r.read_byte().unwrap();
        r.start_caching();
        r.read_byte().unwrap();
        assert_eq!(r.cache(), b"c");
    }

    #[test]
    fn test_capacity_truncates() {
        let input = vec![b'x'; CACHE_CAPACITY + 100];
        let mut r = CachedReader::new(Cursor::new(input));
        r.start_caching();
        let mut out = Vec::new();
        r.read_until_any(b"<", &mut out).unwrap();
        assert_eq!(out.len(), CACHE_CAPACITY + 100);
        assert_eq!(r.cache().len(), CACHE_CAPACITY);
    }

    #[test]
    fn test_read_until_stops_before_delimiter() {
        let mut r = CachedReader::new(Cursor::new("hello<b>".as_bytes()));
        r.start_caching();
        let mut out = Vec::new();
        assert_eq!(r.read_until_any(b"<&", &mut out).unwrap(), 5);
        assert_eq!(out, b"hello");
        assert_eq!(r.read_byte().unwrap(), Some(b'<'));
        assert_eq!(r.cache(), b"hello<");
    }
}
