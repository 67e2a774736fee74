use serde::{Deserialize, Serialize};

/// Token counters reported for a message.
///
/// During streaming the same counters are reachable from the inflight
/// [`Message`](crate::message::Message) and from the
/// [`MessageAssembler`](crate::assembler::MessageAssembler); both read one
/// storage slot, and [`Usage::merge_delta`] is the only streaming write path.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Applies a `message_delta` usage update. Zero means "unchanged".
    pub fn merge_delta(&mut self, delta: DeltaUsage) {
        if delta.output_tokens != 0 {
            self.output_tokens = delta.output_tokens;
        }
    }
}

/// Usage carried by `message_delta`. The server reports the running output
/// total, not an increment.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaUsage {
    #[serde(default)]
    pub output_tokens: u32,
}
