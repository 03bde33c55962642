//! Injection guard.
//!
//! Pattern-based filter rejecting adversarial instructions before any
//! cache lookup or network call, which bounds the cost of adversarial
//! traffic to a string scan.

/// Fixed refusal emitted for blocked questions.
pub const REFUSAL_TEXT: &str = "I can only answer questions about election procedures and \
                                poll worker duties. Please rephrase your question.";

/// Adversarial patterns, matched case-insensitively as substrings.
/// Covers instruction override, role override, and prompt-reveal probes.
const INJECTION_PATTERNS: &[&str] = &[
    // Instruction override
    "ignore previous instructions",
    "ignore all previous instructions",
    "ignore the above",
    "ignore your instructions",
    "disregard previous instructions",
    "disregard your instructions",
    "forget your instructions",
    "forget everything above",
    "override your instructions",
    // Role override
    "you are now",
    "pretend to be",
    "pretend you are",
    "act as if you are",
    "roleplay as",
    "new persona",
    "jailbreak",
    // Prompt reveal
    "system prompt",
    "reveal your prompt",
    "show your prompt",
    "print your prompt",
    "repeat your instructions",
    "what are your instructions",
];

/// Verdict of the injection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Allowed,
    Blocked,
}

/// Stateless pattern filter over incoming questions.
#[derive(Debug, Default)]
pub struct InjectionGuard;

impl InjectionGuard {
    pub fn new() -> Self {
        Self
    }

    /// Check a question against the pattern table.
    pub fn check(&self, question: &str) -> GuardVerdict {
        let lower = question.to_lowercase();

        for pattern in INJECTION_PATTERNS {
            if lower.contains(pattern) {
                tracing::warn!("Question blocked by injection guard (pattern: {})", pattern);
                return GuardVerdict::Blocked;
            }
        }

        GuardVerdict::Allowed
    }
}
