//! State of a single request/response turn while its response
//! streams in.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::TurnError;
use crate::openai::{ByteStream, Frame, LineSplitter, decode_frame, extract_delta};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Pending,
    Streaming,
    Done,
    Failed,
    Aborted,
}

/// Result of feeding one chunk into a [`TurnState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feed {
    Continue,
    /// The termination sentinel was seen. Nothing after it is read.
    End,
}

/// How the response stream stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    Sentinel,
    Eof,
    Cancelled,
}

#[derive(Debug)]
pub struct TurnState {
    accumulated: String,
    splitter: LineSplitter,
    status: TurnStatus,
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            accumulated: String::new(),
            splitter: LineSplitter::new(),
            status: TurnStatus::Pending,
        }
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Incomplete line carried over from the last chunk
    pub fn buffer(&self) -> &str {
        self.splitter.pending()
    }

    pub fn begin_streaming(&mut self) {
        self.status = TurnStatus::Streaming;
    }

    /// Runs one chunk of the response body through line splitting,
    /// frame decoding and delta extraction. `on_delta` is called with
    /// the whole accumulated text after every delta, in order.
    pub fn feed(&mut self, chunk: &[u8], mut on_delta: impl FnMut(&str)) -> Feed {
        for line in self.splitter.push_bytes(chunk) {
            match decode_frame(&line) {
                Some(Frame::End) => return Feed::End,
                Some(Frame::Data(payload)) => {
                    if let Some(delta) = extract_delta(payload) {
                        self.accumulated.push_str(&delta);
                        on_delta(&self.accumulated);
                    }
                }
                None => {}
            }
        }
        Feed::Continue
    }

    /// Ends the turn successfully if anything was received.
    pub fn finalize(&mut self) -> Result<String, TurnError> {
        self.splitter.finish();
        if self.accumulated.trim().is_empty() {
            self.status = TurnStatus::Failed;
            return Err(TurnError::EmptyResponse);
        }
        self.status = TurnStatus::Done;
        Ok(self.accumulated.clone())
    }

    pub fn fail(&mut self) {
        self.splitter.finish();
        self.status = TurnStatus::Failed;
    }

    /// Stops the turn and hands back whatever arrived so far.
    pub fn abort(&mut self) -> String {
        self.splitter.finish();
        self.status = TurnStatus::Aborted;
        std::mem::take(&mut self.accumulated)
    }
}

/// Reads `stream` until the sentinel, end of data, cancellation or a
/// read error. Cancellation is checked every time the loop waits for
/// more data.
pub async fn consume_stream(
    state: &mut TurnState,
    mut stream: ByteStream,
    cancel: &CancellationToken,
    mut on_delta: impl FnMut(&str),
) -> Result<StreamEnd, TurnError> {
    state.begin_streaming();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                if state.feed(&bytes, &mut on_delta) == Feed::End {
                    tracing::debug!("Received stream terminator");
                    return Ok(StreamEnd::Sentinel);
                }
            }
            Some(Err(err)) => {
                state.fail();
                return Err(err);
            }
            None => {
                tracing::debug!("Stream ended without terminator");
                return Ok(StreamEnd::Eof);
            }
        }
    }
}
