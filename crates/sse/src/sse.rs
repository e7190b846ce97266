use std::fmt::{self, Display};

use crate::chunks::{Chunks, Error as ChunksError};

/// Error type for [`Sse`].
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The chunk source failed.
    ChunksError(ChunksError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChunksError(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

/// One dispatched server-sent event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event` field, if any.
    pub event: Option<String>,
    /// The `data` lines joined with line feeds, if any were present.
    pub data: Option<String>,
}

/// A type for reading server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    // Bytes of a UTF-8 sequence that was split across two chunks.
    pending: Vec<u8>,
    // The last buffered character was a CR, so a leading LF belongs to it.
    after_cr: bool,
    chunks: Chunks,
}

impl Sse {
    /// Creates a reader over the given chunks.
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            after_cr: false,
            chunks,
        }
    }

    /// Returns the next complete event, or `None` when the body ends.
    ///
    /// Buffered events are returned before more data is read, so a caller
    /// that stops early never pulls chunks it doesn't need.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, Error> {
        loop {
            if let Some(event) = self.try_parse_event() {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                if !self.buf.trim().is_empty() {
                    trace!("discarding incomplete event: {:?}", self.buf);
                }
                self.buf.clear();
                return Ok(None);
            };
            self.push_bytes(&bytes);
        }
    }

    // Invalid sequences become U+FFFD, so one corrupt byte only spoils the
    // text around it.
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut rest = self.pending.as_slice();
        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, invalid) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // An incomplete sequence at the tail, wait for the
                        // next chunk.
                        None => {
                            rest = invalid;
                            break;
                        }
                        Some(len) => {
                            warn!("replacing {len} invalid byte(s) in event stream");
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        self.push_text(&text);
    }

    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '\r' => self.buf.push('\n'),
                '\n' if self.after_cr => {}
                c => self.buf.push(c),
            }
            self.after_cr = c == '\r';
        }
    }

    fn try_parse_event(&mut self) -> Option<SseEvent> {
        // For `end-of-line`, CR LF and a lone CR are folded into LF when
        // buffering.
        //
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        loop {
            let eol_idx = self.buf.find("\n\n")?;
            let block: String = self.buf.drain(0..eol_idx + 2).collect();

            let mut event = SseEvent::default();
            let mut has_field = false;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match name {
                    "data" => {
                        has_field = true;
                        let data = event.data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" => {
                        has_field = true;
                        event.event = Some(value.to_owned());
                    }
                    _ => {
                        trace!("ignoring field: {name}");
                    }
                }
            }

            if has_field {
                return Some(event);
            }
            // Comment-only blocks are keep-alives, look at the next one.
        }
    }
}
