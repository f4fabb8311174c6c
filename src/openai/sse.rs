//! Line splitting and frame classification for the completion event
//! stream.
//!
//! Network reads don't line up with frames. A read can end in the
//! middle of a line or even in the middle of a multi-byte UTF-8
//! character, so both are carried forward until the next read
//! completes them.

/// Every payload frame starts with this prefix
pub const DATA_PREFIX: &str = "data:";

/// Payload of the frame that terminates the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Turns arbitrary chunks of bytes into complete, newline terminated
/// lines.
///
/// Whatever follows the last newline stays pending until more data
/// arrives. Frames are always newline terminated so a pending line
/// left over when the stream ends is dropped rather than parsed.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: String,
    // Leading bytes of a UTF-8 sequence split across reads
    partial_char: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` as UTF-8 and returns the lines it completes.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> CompleteLines<'_> {
        let text = self.decode_utf8(chunk);
        self.push_str(&text)
    }

    /// Appends already decoded text and returns the lines it completes.
    ///
    /// Lines are produced lazily: anything the caller doesn't pull
    /// stays buffered.
    pub fn push_str(&mut self, fragment: &str) -> CompleteLines<'_> {
        self.pending.push_str(fragment);
        CompleteLines {
            pending: &mut self.pending,
        }
    }

    /// Incomplete trailing fragment waiting for its newline
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Ends the stream, discarding any unterminated line. Returns the
    /// number of bytes that were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len() + self.partial_char.len();
        if dropped > 0 {
            tracing::debug!("Discarding {} bytes of unterminated stream data", dropped);
        }
        self.pending.clear();
        self.partial_char.clear();
        dropped
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.partial_char);
        bytes.extend_from_slice(chunk);

        let mut decoded = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        decoded.push_str(valid);
                    }
                    match err.error_len() {
                        // Invalid sequence in the middle of the data
                        Some(len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Truncated sequence at the end, wait for the rest
                        None => {
                            self.partial_char = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        decoded
    }
}

/// Iterator over the complete lines currently buffered in a
/// [`LineSplitter`]. Lines don't include the trailing newline.
#[derive(Debug)]
pub struct CompleteLines<'a> {
    pending: &'a mut String,
}

impl Iterator for CompleteLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.pending.find('\n')?;
        let mut line: String = self.pending.drain(..=end).collect();
        line.pop();
        Some(line)
    }
}

/// A line of the event stream that means something to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Trimmed payload, expected to be JSON
    Data(&'a str),
    /// The termination sentinel was received
    End,
}

/// Classifies one complete line. Blank lines and anything that isn't
/// a `data:` frame (comments, `event:` lines, unknown fields) yield
/// `None`.
pub fn decode_frame(line: &str) -> Option<Frame<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == DONE_SENTINEL {
        Some(Frame::End)
    } else {
        Some(Frame::Data(payload))
    }
}
