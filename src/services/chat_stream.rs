use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::debug;

use crate::models::chat::{ChatAnswer, ChatFrame};

/// Splits a chunked byte stream into lines. Partial lines are carried over between
/// chunks; a line may be split anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct LineFramer {
    carry: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completed, without the terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }
        lines
    }

    /// Ends the stream, returning an unterminated final line if one is buffered.
    pub fn finish(self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            Some(decode_line(&self.carry))
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = String::from_utf8_lossy(raw);
    line.strip_suffix('\r').unwrap_or(&*line).to_string()
}

/// Keeps the last well-formed frame seen; everything before it is discarded.
#[derive(Debug, Default)]
pub struct FinalFrameReader {
    framer: LineFramer,
    last: Option<ChatFrame>,
    frames: usize,
}

impl FinalFrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        for line in self.framer.push(chunk) {
            self.observe(&line);
        }
    }

    fn observe(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<ChatFrame>(line) {
            Ok(frame) => {
                self.frames += 1;
                self.last = Some(frame);
            }
            Err(e) => debug!("Skipping malformed chat frame: {}", e),
        }
    }

    /// Answer and sources of the last frame; empty when no frame parsed.
    pub fn finish(mut self) -> ChatAnswer {
        if let Some(tail) = std::mem::take(&mut self.framer).finish() {
            self.observe(&tail);
        }
        debug!("Chat stream ended after {} frames", self.frames);
        self.last.and_then(|frame| frame.data).unwrap_or_default()
    }
}

/// Drains a response body and returns its final answer. Transport errors abort.
pub async fn read_final_answer<S, E>(mut body: S) -> Result<ChatAnswer, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut reader = FinalFrameReader::new();
    while let Some(chunk) = body.next().await {
        reader.push(&chunk?);
    }
    Ok(reader.finish())
}
