// Bounded stream capture

/// Accumulates decoded stream chunks, retaining at most `max_bytes` of the head.
///
/// Once a chunk has been cut the buffer is sealed, so the retained text is
/// always a contiguous prefix of the stream.
#[derive(Debug)]
pub struct CaptureBuffer {
    text: String,
    max_bytes: usize,
    dropped_bytes: usize,
    sealed: bool,
}

impl CaptureBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            text: String::new(),
            max_bytes,
            dropped_bytes: 0,
            sealed: false,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        if self.sealed {
            self.dropped_bytes += chunk.len();
            return;
        }

        let room = self.max_bytes.saturating_sub(self.text.len());
        if chunk.len() <= room {
            self.text.push_str(chunk);
            return;
        }

        let mut cut = room;
        while !chunk.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&chunk[..cut]);
        self.dropped_bytes += chunk.len() - cut;
        self.sealed = true;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Bytes seen but not retained
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }
}
