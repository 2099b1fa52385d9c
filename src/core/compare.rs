//! Equivalence check between the legacy response and the shadow response.
//!
//! Comparison is observation only: the outcome is logged and returned for
//! tests, and nothing about the client-visible response changes.

/// What the comparison concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Neither side produced a body.
    BothEmpty,
    /// Exactly one side produced a body.
    OneEmpty,
    /// Both bodies are present and identical.
    Match,
    /// Both bodies are present and differ.
    Mismatch,
    /// The captured legacy bytes are not valid UTF-8; comparison aborted.
    Undecodable,
}

/// Compare the captured legacy response bytes against the shadow response
/// body. `shadow_body` is `None` when the shadow request failed.
pub fn compare_bodies(original: &[u8], shadow_body: Option<&str>) -> ComparisonOutcome {
    let original = if original.is_empty() {
        None
    } else {
        match std::str::from_utf8(original) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "captured response bytes are not valid UTF-8, skipping comparison");
                return ComparisonOutcome::Undecodable;
            }
        }
    };
    let shadow = shadow_body.filter(|body| !body.is_empty());

    match (original, shadow) {
        (None, None) => {
            tracing::info!("Both responses are null/empty");
            ComparisonOutcome::BothEmpty
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::info!("One response is null/empty, the other is not");
            ComparisonOutcome::OneEmpty
        }
        (Some(original), Some(shadow)) => {
            if original == shadow {
                tracing::info!("Responses match.");
                ComparisonOutcome::Match
            } else {
                tracing::info!("Responses DO NOT match.");
                ComparisonOutcome::Mismatch
            }
        }
    }
}
