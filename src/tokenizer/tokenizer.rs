/// Streaming scanner that strips side-channel spans out of PTY output
use tracing::{debug, trace};

use super::Payload;

/// Byte sequence that opens a side-channel span.
pub const MARKER: &[u8] = b"\x1b]9999;json-render;";

/// Byte that closes a side-channel span (BEL).
pub const TERMINATOR: u8 = 0x07;

/// Scanner state carried between chunks.
///
/// `Normal::residual` only ever holds a proper prefix of [`MARKER`], so it is
/// always shorter than the marker. `Capturing::scanned` is how much of the
/// payload has already been searched for the terminator.
#[derive(Debug)]
enum ScanState {
    Normal { residual: Vec<u8> },
    Capturing { payload: Vec<u8>, scanned: usize },
}

impl Default for ScanState {
    fn default() -> Self {
        ScanState::Normal {
            residual: Vec::new(),
        }
    }
}

/// Output of one [`Tokenizer::feed`] call
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Tokenized {
    /// Terminal bytes with every complete side-channel span removed
    pub terminal: Vec<u8>,
    /// Payloads completed by this chunk, in stream order
    pub payloads: Vec<Payload>,
}

impl Tokenized {
    pub fn is_empty(&self) -> bool {
        self.terminal.is_empty() && self.payloads.is_empty()
    }
}

/// Online tokenizer for the marker/terminator framed side channel.
///
/// Feeding the same bytes split into any chunks yields the same concatenated
/// terminal output and the same ordered payloads. Once a marker has been
/// matched its bytes never come back as terminal output, even if the
/// terminator never arrives.
#[derive(Debug, Default)]
pub struct Tokenizer {
    state: ScanState,
    forwarded: u64,
    dropped: u64,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk of PTY output.
    pub fn feed(&mut self, chunk: &[u8]) -> Tokenized {
        let mut out = Tokenized::default();
        let mut state = std::mem::take(&mut self.state);

        match &mut state {
            ScanState::Normal { residual } => residual.extend_from_slice(chunk),
            ScanState::Capturing { payload, .. } => payload.extend_from_slice(chunk),
        }

        loop {
            state = match state {
                ScanState::Normal { residual: buffer } => match find_marker(&buffer) {
                    Some(start) => {
                        out.terminal.extend_from_slice(&buffer[..start]);
                        ScanState::Capturing {
                            payload: buffer[start + MARKER.len()..].to_vec(),
                            scanned: 0,
                        }
                    }
                    None => {
                        let split = buffer.len() - partial_marker_len(&buffer);
                        out.terminal.extend_from_slice(&buffer[..split]);
                        self.state = ScanState::Normal {
                            residual: buffer[split..].to_vec(),
                        };
                        return out;
                    }
                },
                ScanState::Capturing { payload, scanned } => {
                    match payload[scanned..].iter().position(|&b| b == TERMINATOR) {
                        Some(offset) => {
                            let end = scanned + offset;
                            self.complete(&payload[..end], &mut out);
                            ScanState::Normal {
                                residual: payload[end + 1..].to_vec(),
                            }
                        }
                        None => {
                            trace!("side-channel span still open, {} bytes held", payload.len());
                            let scanned = payload.len();
                            self.state = ScanState::Capturing { payload, scanned };
                            return out;
                        }
                    }
                }
            };
        }
    }

    /// Whether the scanner is inside an unterminated span
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, ScanState::Capturing { .. })
    }

    /// Number of payloads handed out so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Number of captured spans discarded because they were not JSON
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn complete(&mut self, body: &[u8], out: &mut Tokenized) {
        match Payload::parse(body) {
            Some(payload) => {
                self.forwarded += 1;
                out.payloads.push(payload);
            }
            None => {
                self.dropped += 1;
                debug!("dropping side-channel span of {} bytes: not valid JSON", body.len());
            }
        }
    }
}

fn find_marker(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(MARKER.len())
        .position(|window| window == MARKER)
}

/// Length of the longest suffix of `buffer` that is a proper prefix of the marker.
fn partial_marker_len(buffer: &[u8]) -> usize {
    let longest = (MARKER.len() - 1).min(buffer.len());
    (1..=longest)
        .rev()
        .find(|&len| buffer.ends_with(&MARKER[..len]))
        .unwrap_or(0)
}
