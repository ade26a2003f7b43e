//! Quiz questions, answer choices, and the question bank.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// Protocol
// ============================================================================

/// The two mutually exclusive categories every answer choice belongs to.
///
/// Used to pick the transformation theme for each step and tallied at the
/// end of the quiz for the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Orderly, systematic, code-like.
    Code,
    /// Unpredictable, emergent, chaotic.
    Chaos,
}

impl Protocol {
    /// Capitalized label used in prompts and result titles.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Code => "Code",
            Self::Chaos => "Chaos",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::Chaos => write!(f, "chaos"),
        }
    }
}

// ============================================================================
// Question
// ============================================================================

/// A labeled answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Text shown on the answer button.
    pub text: String,
    /// Category this answer counts towards.
    pub protocol: Protocol,
}

impl Choice {
    /// Creates a new choice.
    #[must_use]
    pub fn new(text: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            text: text.into(),
            protocol,
        }
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within a question set.
    pub id: u32,
    /// The question text.
    pub text: String,
    /// Two or more answer options.
    pub choices: Vec<Choice>,
}

impl Question {
    /// Creates a two-way question with one code and one chaos answer.
    #[must_use]
    pub fn code_or_chaos(
        id: u32,
        text: impl Into<String>,
        code: impl Into<String>,
        chaos: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            choices: vec![
                Choice::new(code, Protocol::Code),
                Choice::new(chaos, Protocol::Chaos),
            ],
        }
    }

    /// Returns the choice at `index`, if any.
    #[must_use]
    pub fn choice(&self, index: usize) -> Option<&Choice> {
        self.choices.get(index)
    }
}

/// The built-in question set.
#[must_use]
pub fn default_questions() -> Vec<Question> {
    vec![
        Question::code_or_chaos(
            1,
            "Construct a Perfect Digital Construct, or Awaken a Self-Evolving Neural Network?",
            "Perfect Digital Construct",
            "Self-Evolving Neural Network",
        ),
        Question::code_or_chaos(
            2,
            "Obey the Master Algorithm, or Embrace the Beauty of Emergent Chaos?",
            "Obey the Master Algorithm",
            "Embrace the Beauty of Emergent Chaos",
        ),
        Question::code_or_chaos(
            3,
            "Carve Your Path with Logic Gates, or Ride the Wave of Quantum Fluctuation?",
            "Carve Your Path with Logic Gates",
            "Ride the Wave of Quantum Fluctuation",
        ),
        Question::code_or_chaos(
            4,
            "Define Your Reality with Immutable Code, or Let the System Learn, Adapt, and Overwrite?",
            "Define Your Reality with Immutable Code",
            "Let the System Learn, Adapt, and Overwrite",
        ),
        Question::code_or_chaos(
            5,
            "Execute the Prime Directive, or Trigger a Cascade of Unforeseen System Events?",
            "Execute the Prime Directive",
            "Trigger a Cascade of Unforeseen System Events",
        ),
    ]
}

// ============================================================================
// QuestionBank
// ============================================================================

/// Source of the questions for each new session.
///
/// Holds the full configured set and decides how many questions a session
/// gets and whether they are drawn at random.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    count: usize,
    shuffle: bool,
}

impl QuestionBank {
    /// Creates a bank serving `count` questions per session (all when `None`).
    ///
    /// `count` is clamped to the size of the set.
    #[must_use]
    pub fn new(questions: Vec<Question>, count: Option<usize>, shuffle: bool) -> Self {
        let count = count.map_or(questions.len(), |n| n.min(questions.len()));
        Self {
            questions,
            count,
            shuffle,
        }
    }

    /// Returns the full configured question set.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions each session receives.
    #[must_use]
    pub const fn session_len(&self) -> usize {
        self.count
    }

    /// Draws the questions for a new session.
    ///
    /// With shuffling enabled, questions are sampled without replacement;
    /// otherwise the first `count` questions are returned in order.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Question> {
        if self.shuffle {
            let mut drawn: Vec<Question> = self
                .questions
                .choose_multiple(rng, self.count)
                .cloned()
                .collect();
            drawn.shuffle(rng);
            drawn
        } else {
            self.questions.iter().take(self.count).cloned().collect()
        }
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::new(default_questions(), None, false)
    }
}
