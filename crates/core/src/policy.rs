use crate::model::QuizDraft;

/// Decides whether a generated reply should carry a locally synthesized quiz.
///
/// Only consulted when the generation service did not attach a quiz itself.
pub trait QuizPolicy: Send + Sync {
    fn synthesize(&self, reply: &str) -> Option<QuizDraft>;
}

/// Never synthesizes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuizzes;

impl QuizPolicy for NoQuizzes {
    fn synthesize(&self, _reply: &str) -> Option<QuizDraft> {
        None
    }
}

struct KeywordEntry {
    keyword: &'static str,
    topic: &'static str,
    question: &'static str,
    options: [&'static str; 4],
    correct_index: usize,
    explanation: &'static str,
    hints: &'static [&'static str],
}

const DEFAULT_TABLE: &[KeywordEntry] = &[
    KeywordEntry {
        keyword: "array",
        topic: "Arrays",
        question: "Which of the following is a valid way to declare an array in Python?",
        options: [
            "arr = [1, 2, 3]",
            "array arr = [1, 2, 3]",
            "arr = array(1,2,3)",
            "int arr[3] = {1,2,3}",
        ],
        correct_index: 0,
        explanation: "Python uses list literals in square brackets; the other forms are \
                      not valid Python syntax.",
        hints: &[
            "Python has no type declarations.",
            "Look for square brackets.",
        ],
    },
    KeywordEntry {
        keyword: "stack",
        topic: "Stacks",
        question: "Which element does a stack remove first?",
        options: [
            "The most recently added",
            "The first one added",
            "The smallest",
            "A random element",
        ],
        correct_index: 0,
        explanation: "A stack is last-in, first-out.",
        hints: &["Think of a pile of plates."],
    },
    KeywordEntry {
        keyword: "queue",
        topic: "Queues",
        question: "Which element does a queue remove first?",
        options: [
            "The most recently added",
            "The first one added",
            "The largest",
            "The middle element",
        ],
        correct_index: 1,
        explanation: "A queue is first-in, first-out.",
        hints: &["Think of a line at a shop."],
    },
    KeywordEntry {
        keyword: "binary search",
        topic: "Searching",
        question: "What must be true of the input for binary search to work?",
        options: [
            "It must be sorted",
            "It must contain no duplicates",
            "Its length must be a power of two",
            "It must be a linked list",
        ],
        correct_index: 0,
        explanation: "Binary search halves the range by comparing against the middle \
                      element, which only works on sorted input.",
        hints: &["How does it pick which half to keep?"],
    },
];

/// Case-insensitive substring match against a fixed keyword table. The first
/// table entry whose keyword appears in the reply wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordQuizzes;

impl KeywordQuizzes {
    #[must_use]
    pub fn keywords() -> impl Iterator<Item = &'static str> {
        DEFAULT_TABLE.iter().map(|e| e.keyword)
    }
}

impl QuizPolicy for KeywordQuizzes {
    fn synthesize(&self, reply: &str) -> Option<QuizDraft> {
        let lowered = reply.to_lowercase();
        let entry = DEFAULT_TABLE
            .iter()
            .find(|e| lowered.contains(e.keyword))?;
        Some(QuizDraft {
            question: entry.question.to_string(),
            options: entry.options.iter().map(ToString::to_string).collect(),
            correct_index: entry.correct_index,
            explanation: entry.explanation.to_string(),
            difficulty: Some("easy".to_string()),
            topic: Some(entry.topic.to_string()),
            hints: entry.hints.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizId, QuizOrigin};

    #[test]
    fn matches_keyword_case_insensitively() {
        let draft = KeywordQuizzes
            .synthesize("ARRAYS store items contiguously.")
            .unwrap();
        assert_eq!(draft.topic.as_deref(), Some("Arrays"));
        assert_eq!(draft.correct_index, 0);
        assert!(draft.validate(QuizId::new(1), QuizOrigin::Synthesized).is_ok());
    }

    #[test]
    fn no_keyword_no_quiz() {
        assert!(KeywordQuizzes.synthesize("Recursion calls itself.").is_none());
        assert!(NoQuizzes.synthesize("an array").is_none());
    }

    #[test]
    fn every_table_entry_is_a_valid_quiz() {
        for keyword in KeywordQuizzes::keywords() {
            let draft = KeywordQuizzes.synthesize(keyword).unwrap();
            assert!(draft.validate(QuizId::new(9), QuizOrigin::Synthesized).is_ok());
        }
    }

    #[test]
    fn table_order_breaks_ties() {
        let draft = KeywordQuizzes
            .synthesize("a queue can be built on an array")
            .unwrap();
        assert_eq!(draft.topic.as_deref(), Some("Arrays"));
    }
}
