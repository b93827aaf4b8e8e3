/// Side-channel tokenizer for hosted terminal output
/// Splits a chunked PTY byte stream into passthrough terminal bytes and
/// JSON payloads framed by an OSC-style marker and a BEL terminator.
mod payload;
mod tokenizer;


pub use payload::Payload;
pub use tokenizer::{Tokenized, Tokenizer};

#[cfg(test)]
pub use tokenizer::{MARKER, TERMINATOR};
