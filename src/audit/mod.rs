//! Transcript integrity
//!
//! Exports carry a SHA-256 checksum over the serialized conversation so an
//! archived transcript can be verified later.

use crate::models::{Message, SessionExport};
use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute the hex SHA-256 of a conversation.
/// Streams JSON directly into the hasher (no intermediate String).
pub fn compute_transcript_checksum(conversation: &[Message]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), conversation).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// True when the export's checksum matches its conversation
pub fn verify_export(export: &SessionExport) -> bool {
    !export.checksum.is_empty() && compute_transcript_checksum(&export.conversation) == export.checksum
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
