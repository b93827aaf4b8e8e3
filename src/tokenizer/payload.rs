/// Decoded side-channel payload
use std::fmt;

use serde_json::value::RawValue;

/// A side-channel payload that has been validated as JSON.
///
/// The original JSON text is kept as-is so it can be forwarded to the
/// browser without being re-serialized.
#[derive(Clone)]
pub struct Payload(Box<RawValue>);

impl Payload {
    /// Validate captured bytes as a JSON document.
    /// Returns `None` for anything serde_json refuses, including invalid UTF-8.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Box<RawValue>>(bytes).ok().map(Self)
    }

    /// JSON text of the payload
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    pub fn raw(&self) -> &RawValue {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.as_str()).finish()
    }
}
