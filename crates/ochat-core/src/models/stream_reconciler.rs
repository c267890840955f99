use super::fragment_decoder::Utf8FragmentDecoder;
use super::message::Message;

/// Folds the fragments of one generation into a single assistant message.
///
/// The assistant reply is one evolving entity: every fragment produces a new
/// rendering of the same message, never an additional one. Fragments must be
/// applied in emission order, one at a time.
#[derive(Debug)]
pub struct StreamReconciler {
    conversation_id: String,
    decoder: Utf8FragmentDecoder,
    accumulator: String,
    fragments: usize,
}

impl StreamReconciler {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            decoder: Utf8FragmentDecoder::new(),
            accumulator: String::new(),
            fragments: 0,
        }
    }

    /// Decode `fragment`, append it to the accumulator and return the
    /// current in-progress assistant message.
    pub fn apply(&mut self, fragment: &[u8]) -> Message {
        let text = self.decoder.decode(fragment);
        self.accumulator.push_str(&text);
        self.fragments += 1;
        self.in_progress()
    }

    pub fn in_progress(&self) -> Message {
        Message::assistant(self.accumulator.clone(), self.conversation_id.clone())
    }

    /// Close the generation and return the final assistant message.
    pub fn finish(mut self) -> Message {
        let tail = self.decoder.finish();
        self.accumulator.push_str(&tail);
        Message::assistant(self.accumulator, self.conversation_id)
    }

    pub fn fragments_applied(&self) -> usize {
        self.fragments
    }
}
