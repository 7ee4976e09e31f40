//! Token counting on the fixed `cl100k_base` subword vocabulary.
//!
//! Every sizing decision in the pipeline is made in tokens: chunk budgets,
//! the single-call vs. clustered path choice, and the reduce-stage output
//! budget. Counts must therefore be stable across calls and directly
//! comparable to the completion model's context limit, which is why the
//! encoder is fixed rather than configurable. The vocabulary ships with the
//! crate; counting involves no network and no randomness.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Literal control sequences that the embedding service rejects or
/// mis-encodes when they appear verbatim in input text.
///
/// Counting is immune to them ([`count_tokens`] encodes them as ordinary
/// text), but embedding-bound text must have them removed first — see
/// [`strip_reserved`].
pub const RESERVED_SEQUENCES: &[&str] = &[
    "<|endoftext|>",
    "<|fim_prefix|>",
    "<|fim_middle|>",
    "<|fim_suffix|>",
    "<|endofprompt|>",
];

static ENCODER: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("bundled cl100k_base vocabulary must load"));

/// Count the tokens in `text`.
///
/// Uses ordinary encoding throughout: a literal `<|endoftext|>` in a
/// document is counted as the plain characters it is, never interpreted as
/// a control token, so counting cannot fail on hostile or machine-generated
/// input.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    ENCODER.encode_ordinary(text).len()
}

/// Remove all [`RESERVED_SEQUENCES`] occurrences from `text`.
#[must_use]
pub fn strip_reserved(text: &str) -> String {
    let mut out = text.to_string();
    for marker in RESERVED_SEQUENCES {
        if out.contains(marker) {
            out = out.replace(marker, "");
        }
    }
    out
}

/// Shared handle to the process-wide encoder, for callers that need raw
/// token streams (the token-window chunker).
pub(crate) fn encoder() -> &'static CoreBPE {
    &ENCODER
}
