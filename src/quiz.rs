//! Arithmetic quiz engine
//!
//! A quiz is a fixed list of `a + b` questions with single-digit operands,
//! answered strictly in order.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One quiz question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question text without the ordinal, e.g. `3 + 4`
    pub prompt: String,
    /// The correct sum
    pub expected_answer: i64,
}

/// Progress through a running quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizState {
    pub questions: Vec<QuizQuestion>,
    pub current_index: usize,
    pub correct_count: usize,
}

/// Result of submitting one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// More questions remain; `index` is the zero-based position of `prompt`
    Next { index: usize, prompt: String },
    /// The last question was answered
    Finished { correct: usize, total: usize },
}

/// Generates `count` questions using the thread-local RNG.
#[must_use]
pub fn generate(count: usize) -> QuizState {
    generate_with(&mut rand::thread_rng(), count)
}

/// Generates `count` questions from the given RNG.
///
/// Operands are drawn independently and uniformly from `0..=9`; the order
/// of generation is the order of asking.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, count: usize) -> QuizState {
    let questions = (0..count)
        .map(|_| {
            let a: i64 = rng.gen_range(0..=9);
            let b: i64 = rng.gen_range(0..=9);
            QuizQuestion {
                prompt: format!("{a} + {b}"),
                expected_answer: a + b,
            }
        })
        .collect();

    QuizState {
        questions,
        current_index: 0,
        correct_count: 0,
    }
}

impl QuizState {
    /// The question waiting for an answer, if any.
    #[must_use]
    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_index)
    }

    /// Total number of questions
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Scores `raw` against the current question and advances.
    ///
    /// Text that does not parse as an integer counts as a wrong answer.
    pub fn submit_answer(&mut self, raw: &str) -> AnswerOutcome {
        let answer = raw.trim().parse::<i64>().ok();

        if let Some(question) = self.current() {
            if answer == Some(question.expected_answer) {
                self.correct_count += 1;
            }
            self.current_index += 1;
        }

        match self.current() {
            Some(next) => AnswerOutcome::Next {
                index: self.current_index,
                prompt: next.prompt.clone(),
            },
            None => AnswerOutcome::Finished {
                correct: self.correct_count,
                total: self.total(),
            },
        }
    }
}
