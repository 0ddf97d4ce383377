use memchr::memchr2;

/// Frame delimiter the re-framer appends to outgoing and passthrough frames.
pub const FRAME_DELIMITER: &str = "\n\n";

const DATA_PREFIX: &[u8] = b"data: ";

/// Stage 1 of the re-framer: incremental extraction of `data: <payload>`
/// frames from the backend's SSE byte stream.
///
/// Raw bytes are appended to one growing buffer; complete frames are matched
/// at the buffer head and removed, terminator included. Whatever does not yet
/// form a complete frame persists for the next input chunk, so a frame split
/// at any byte boundary still comes out whole.
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buffer: Vec<u8>,
}

/// The unterminated remainder reported by [`FrameExtractor::flush`].
///
/// Stage 2 must not append a frame delimiter when passing this through: the
/// data was already malformed on the wire.
#[derive(Debug)]
pub struct MalformedTail(pub String);

impl FrameExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and append each complete frame's payload to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<String>) {
        self.buffer.extend_from_slice(chunk);
        while let Some(payload) = self.try_extract() {
            out.push(payload);
        }
    }

    /// Match one `data: <payload>` frame at the buffer head.
    ///
    /// The payload runs to the first CR/LF; the terminator must then be one
    /// of `\n\n`, `\r\r` or `\r\n\r\n`. Anything else (including a frame that
    /// has not fully arrived) leaves the buffer untouched.
    fn try_extract(&mut self) -> Option<String> {
        if !self.buffer.starts_with(DATA_PREFIX) {
            return None;
        }
        let rest = &self.buffer[DATA_PREFIX.len()..];
        let payload_len = memchr2(b'\n', b'\r', rest)?;
        let after = &rest[payload_len..];
        let terminator_len = if after.starts_with(b"\n\n") || after.starts_with(b"\r\r") {
            2
        } else if after.starts_with(b"\r\n\r\n") {
            4
        } else {
            return None;
        };

        let payload = String::from_utf8_lossy(&rest[..payload_len]).into_owned();
        self.buffer
            .drain(..DATA_PREFIX.len() + payload_len + terminator_len);
        Some(payload)
    }

    /// End of stream: report any unterminated remainder.
    ///
    /// The remainder is logged as malformed and handed downstream as-is
    /// (prefix included) rather than dropped, preserving at-least-something
    /// delivery to the client.
    pub fn flush(&mut self) -> Option<MalformedTail> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        tracing::error!(remainder = %tail, "stream ended with unterminated SSE data");
        Some(MalformedTail(tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(extractor: &mut FrameExtractor, chunk: &str) -> Vec<String> {
        let mut out = Vec::new();
        extractor.feed(chunk.as_bytes(), &mut out);
        out
    }

    #[test]
    fn test_extracts_single_frame() {
        let mut extractor = FrameExtractor::new();
        let frames = feed_str(&mut extractor, "data: {\"x\":1}\n\n");
        assert_eq!(frames, vec!["{\"x\":1}"]);
        assert!(extractor.flush().is_none());
    }

    #[test]
    fn test_split_at_every_byte_boundary() {
        let input = "data: {\"x\":1}\n\n";
        for split in 1..input.len() {
            let mut extractor = FrameExtractor::new();
            let mut out = Vec::new();
            extractor.feed(input[..split].as_bytes(), &mut out);
            extractor.feed(input[split..].as_bytes(), &mut out);
            assert_eq!(out, vec!["{\"x\":1}"], "split at byte {split}");
            assert!(extractor.flush().is_none(), "split at byte {split}");
        }
    }

    #[test]
    fn test_multiple_frames_one_chunk() {
        let mut extractor = FrameExtractor::new();
        let frames = feed_str(&mut extractor, "data: a\n\ndata: b\r\n\r\ndata: c\r\r");
        assert_eq!(frames, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_terminator_variants() {
        let mut extractor = FrameExtractor::new();
        assert_eq!(feed_str(&mut extractor, "data: x\r\n\r\n"), vec!["x"]);
        assert_eq!(feed_str(&mut extractor, "data: y\r\r"), vec!["y"]);
    }

    #[test]
    fn test_incomplete_terminator_waits() {
        let mut extractor = FrameExtractor::new();
        assert!(feed_str(&mut extractor, "data: x\r\n").is_empty());
        assert_eq!(feed_str(&mut extractor, "\r\n"), vec!["x"]);
    }

    #[test]
    fn test_flush_reports_malformed_tail() {
        let mut extractor = FrameExtractor::new();
        assert!(feed_str(&mut extractor, "data: half a fra").is_empty());
        let tail = extractor.flush().expect("expected malformed tail");
        assert_eq!(tail.0, "data: half a fra");
        // A second flush has nothing left to report.
        assert!(extractor.flush().is_none());
    }

    #[test]
    fn test_non_data_garbage_is_held_until_flush() {
        let mut extractor = FrameExtractor::new();
        assert!(feed_str(&mut extractor, "event: ping\n\n").is_empty());
        let tail = extractor.flush().expect("expected malformed tail");
        assert_eq!(tail.0, "event: ping\n\n");
    }
}
