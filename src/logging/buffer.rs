//! In-memory capture buffer for log output

use regex::bytes::Regex;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Default)]
struct BufferState {
    contents: Vec<u8>,
    read_cursor: usize,
}

/// Append-only byte sink that can be searched for patterns
///
/// Clones share the same storage, so one handle can be given to a logger
/// while the test keeps another. [`CaptureBuffer::say`] only looks at output
/// that an earlier successful `say` has not already consumed.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panic while holding the lock can only come from a test thread
        // that is already failing; the bytes are still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.lock().contents.clone()
    }

    /// Everything written so far, lossily decoded
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.lock().contents).into_owned()
    }

    /// Output not yet consumed by a successful [`say`](Self::say)
    pub fn unread(&self) -> String {
        let state = self.lock();
        String::from_utf8_lossy(&state.contents[state.read_cursor..]).into_owned()
    }

    /// Search the unread output for `pattern`
    ///
    /// On a match the read cursor moves past the end of the match and
    /// `true` is returned. Otherwise nothing changes.
    pub fn say(&self, pattern: &Regex) -> bool {
        let mut state = self.lock();
        let start = state.read_cursor;
        let matched = pattern.find(&state.contents[start..]).map(|m| m.end());
        match matched {
            Some(end) => {
                state.read_cursor = start + end;
                true
            }
            None => false,
        }
    }

    /// [`say`](Self::say) with `text` matched literally
    ///
    /// Plain byte search, so any text can be looked for regardless of how
    /// large a regex it would compile to.
    pub fn say_literal(&self, text: &str) -> bool {
        let needle = text.as_bytes();
        let mut state = self.lock();
        let start = state.read_cursor;
        let matched = find_bytes(&state.contents[start..], needle).map(|i| i + needle.len());
        match matched {
            Some(end) => {
                state.read_cursor = start + end;
                true
            }
            None => false,
        }
    }

    /// Discard all captured output
    pub fn clear(&self) {
        let mut state = self.lock();
        state.contents.clear();
        state.read_cursor = 0;
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl io::Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().contents.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureBuffer {
    type Writer = CaptureBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_clones_share_storage() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"hello ")?;
        writer.write_all(b"world")?;

        assert_eq!(buffer.contents(), b"hello world");
        assert_eq!(buffer.contents_string(), "hello world");
        Ok(())
    }

    #[test]
    fn test_say_advances_cursor() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"first line\nsecond line\n")?;

        assert!(buffer.say_literal("line"));
        assert_eq!(buffer.unread(), "\nsecond line\n");
        assert!(buffer.say_literal("line"));
        // Both occurrences consumed
        assert!(!buffer.say_literal("line"));
        Ok(())
    }

    #[test]
    fn test_failed_say_keeps_cursor() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"abc")?;

        assert!(!buffer.say_literal("xyz"));
        assert_eq!(buffer.unread(), "abc");
        Ok(())
    }

    #[test]
    fn test_say_literal_escapes_metacharacters() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"aXb")?;

        assert!(!buffer.say_literal("a.b"));
        let wildcard = Regex::new("a.b").unwrap();
        assert!(buffer.say(&wildcard));
        Ok(())
    }

    #[test]
    fn test_say_literal_beyond_regex_size_limit() -> io::Result<()> {
        let big = "a".repeat(20_000_000);
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"prefix ")?;
        buffer.clone().write_all(big.as_bytes())?;

        assert!(Regex::new(&regex::escape(&big)).is_err());
        assert!(buffer.say_literal(&big));
        assert!(buffer.unread().is_empty());
        Ok(())
    }

    #[test]
    fn test_say_literal_empty_text() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"abc")?;

        assert!(buffer.say_literal(""));
        assert_eq!(buffer.unread(), "abc");
        Ok(())
    }

    #[test]
    fn test_clear() -> io::Result<()> {
        let buffer = CaptureBuffer::new();
        buffer.clone().write_all(b"stale")?;
        buffer.clear();

        assert!(buffer.contents().is_empty());
        assert!(!buffer.say_literal("stale"));
        Ok(())
    }
}
