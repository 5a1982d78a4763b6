//! Bounded recent-history view over the conversation log

use super::Utterance;

/// Last `limit` entries of `log`, oldest first
///
/// Always a suffix of `log`; never longer than `limit`.
#[must_use]
pub fn memory_window(log: &[Utterance], limit: usize) -> &[Utterance] {
    &log[log.len().saturating_sub(limit)..]
}
