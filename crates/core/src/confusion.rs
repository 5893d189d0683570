//! Lexical confusion detection and the escalation counter.

use serde::{Deserialize, Serialize};

/// Number of confused turns that triggers an escalation.
pub const DEFAULT_CONFUSION_THRESHOLD: u32 = 3;

/// Phrases that signal the learner is lost. Matched as lowercase substrings.
const CONFUSION_PATTERNS: &[&str] = &[
    "confused",
    "don't get",
    "don't understand",
    "lost",
    "stuck",
];

/// Which reply path a user turn takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnBranch {
    /// Not confused: ask the generation service.
    Normal,
    /// Confused, below threshold: canned simpler explanation.
    Simplify,
    /// Confusion threshold reached: canned redirect to an easier topic.
    Escalate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionSignal {
    pub is_confused: bool,
    pub branch: TurnBranch,
}

/// Counts confused turns and decides when to escalate.
///
/// The counter only moves up, and drops back to zero exactly when it reaches
/// the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionTracker {
    count: u32,
    threshold: u32,
}

impl Default for ConfusionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CONFUSION_THRESHOLD)
    }
}

impl ConfusionTracker {
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Pure classification; the same text always yields the same answer.
    #[must_use]
    pub fn is_confused(text: &str) -> bool {
        let normalized = text.replace('\u{2019}', "'").to_lowercase();
        CONFUSION_PATTERNS.iter().any(|p| normalized.contains(p))
    }

    /// Classify a turn, update the counter, and pick the reply branch.
    pub fn observe(&mut self, text: &str) -> ConfusionSignal {
        let is_confused = Self::is_confused(text);
        if !is_confused {
            return ConfusionSignal {
                is_confused,
                branch: TurnBranch::Normal,
            };
        }

        self.count = self.count.saturating_add(1);
        let branch = if self.count >= self.threshold {
            self.count = 0;
            TurnBranch::Escalate
        } else {
            TurnBranch::Simplify
        };
        ConfusionSignal { is_confused, branch }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
