/// Incremental UTF-8 decoder for generation fragments.
///
/// Backends cut their byte streams wherever the transport chunk ends, so a
/// multi-byte character may arrive in two fragments. The incomplete tail is
/// held back until the rest shows up.
#[derive(Debug, Default)]
pub struct Utf8FragmentDecoder {
    pending: Vec<u8>,
}

impl Utf8FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `fragment` (plus any held-back bytes) as possible.
    /// Invalid sequences are replaced with U+FFFD.
    pub fn decode(&mut self, fragment: &[u8]) -> String {
        self.pending.extend_from_slice(fragment);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more bytes
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still held back once the stream is over.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
