//! Question content and selection.

use crate::royale::models::Difficulty;
use crate::royale::RoyaleResult;
use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases are graded but never shown to players
    #[serde(default)]
    pub is_hidden: bool,
}

impl TestCase {
    pub fn visible(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            is_hidden: false,
        }
    }

    pub fn hidden(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            is_hidden: true,
            ..Self::visible(input, expected_output)
        }
    }
}

/// Question content. Matches keep a frozen copy taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub description: String,
    pub test_cases: Vec<TestCase>,
}

impl Question {
    /// Player-facing view without hidden test cases
    pub fn public_view(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            test_cases: self
                .test_cases
                .iter()
                .filter(|tc| !tc.is_hidden)
                .map(|tc| PublicTestCase {
                    input: tc.input.clone(),
                    expected_output: tc.expected_output.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTestCase {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub test_cases: Vec<PublicTestCase>,
}

/// Source of question pools
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// All questions of a difficulty tier
    async fn pool(&self, difficulty: Difficulty) -> RoyaleResult<Vec<Question>>;
}

/// Pick a question not in `used`; once the pool is exhausted repeats are allowed.
pub fn pick_question<R: Rng + ?Sized>(
    pool: &[Question],
    used: &HashSet<String>,
    rng: &mut R,
) -> Option<Question> {
    let unused: Vec<&Question> = pool.iter().filter(|q| !used.contains(&q.id)).collect();
    if unused.is_empty() {
        pool.choose(rng).cloned()
    } else {
        unused.choose(rng).map(|q| (*q).clone())
    }
}

/// Built-in question bank
#[derive(Debug, Clone)]
pub struct StaticQuestionBank {
    pools: HashMap<Difficulty, Vec<Question>>,
}

impl StaticQuestionBank {
    pub fn new(pools: HashMap<Difficulty, Vec<Question>>) -> Self {
        Self { pools }
    }

    /// The stock question set
    pub fn builtin() -> Self {
        let mut pools = HashMap::new();
        pools.insert(
            Difficulty::Easy,
            vec![
                question(
                    "easy_1",
                    "Reverse a String",
                    "Write code that prints the reverse of `input_data`.",
                    &[("hello", "olleh"), ("world", "dlrow"), ("abc", "cba")],
                ),
                question(
                    "easy_2",
                    "Sum of Digits",
                    "Print the sum of digits of the number given in `input_data`.",
                    &[("123", "6"), ("999", "27"), ("10", "1")],
                ),
                question(
                    "easy_3",
                    "Count Vowels",
                    "Print the number of vowels (a, e, i, o, u) in `input_data`.",
                    &[("hello", "2"), ("aeiou", "5"), ("rhythm", "0")],
                ),
            ],
        );
        pools.insert(
            Difficulty::Medium,
            vec![
                question(
                    "med_1",
                    "Palindrome Check",
                    "Print \"True\" if `input_data` is a palindrome, \"False\" otherwise.",
                    &[("racecar", "True"), ("hello", "False"), ("madam", "True")],
                ),
                question(
                    "med_2",
                    "FizzBuzz Single",
                    "Given a number in `input_data`, print \"FizzBuzz\" if divisible by 15, \
                     \"Fizz\" if by 3, \"Buzz\" if by 5, or the number itself.",
                    &[("15", "FizzBuzz"), ("9", "Fizz"), ("10", "Buzz"), ("7", "7")],
                ),
            ],
        );
        pools.insert(
            Difficulty::Hard,
            vec![
                question(
                    "hard_1",
                    "Prime Factorization",
                    "Print the prime factors of the integer in `input_data`, space-separated \
                     in ascending order.",
                    &[("12", "2 2 3"), ("100", "2 2 5 5"), ("17", "17")],
                ),
                question(
                    "hard_2",
                    "Longest Common Subsequence Length",
                    "Input has two strings comma-separated. Print the length of their longest \
                     common subsequence.",
                    &[("abcde,ace", "3"), ("abc,abc", "3"), ("abc,def", "0")],
                ),
            ],
        );
        Self { pools }
    }
}

impl Default for StaticQuestionBank {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The last test case of each stock question is hidden
fn question(id: &str, title: &str, description: &str, cases: &[(&str, &str)]) -> Question {
    let last = cases.len().saturating_sub(1);
    Question {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        test_cases: cases
            .iter()
            .enumerate()
            .map(|(i, (input, output))| {
                if i == last {
                    TestCase::hidden(*input, *output)
                } else {
                    TestCase::visible(*input, *output)
                }
            })
            .collect(),
    }
}

#[async_trait]
impl QuestionBank for StaticQuestionBank {
    async fn pool(&self, difficulty: Difficulty) -> RoyaleResult<Vec<Question>> {
        // Empty tiers fall back to Easy
        let pool = self
            .pools
            .get(&difficulty)
            .filter(|p| !p.is_empty())
            .or_else(|| self.pools.get(&Difficulty::Easy))
            .cloned()
            .unwrap_or_default();
        Ok(pool)
    }
}
