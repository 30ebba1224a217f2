//! Decoded, shuffled trivia questions.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::api::RawQuestion;
use crate::text::decode_entities;

/// Number of answer options per multiple-choice question.
pub const OPTION_COUNT: usize = 4;

/// A question ready for narration and display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaItem {
    pub question: String,
    pub correct_answer: String,
    /// Shuffled options; always `OPTION_COUNT` long.
    pub answer_options: Vec<String>,
    /// Position of `correct_answer` within `answer_options`.
    pub correct_index: usize,
}

impl TriviaItem {
    /// Decode entities and shuffle the options of a raw question.
    ///
    /// Returns `None` unless the question carries exactly `OPTION_COUNT`
    /// answers in total.
    pub fn from_raw<R: Rng + ?Sized>(raw: &RawQuestion, rng: &mut R) -> Option<Self> {
        if raw.incorrect_answers.len() + 1 != OPTION_COUNT {
            return None;
        }

        let correct_answer = decode_entities(&raw.correct_answer);
        let mut tagged: Vec<(bool, String)> = std::iter::once((true, correct_answer.clone()))
            .chain(
                raw.incorrect_answers
                    .iter()
                    .map(|answer| (false, decode_entities(answer))),
            )
            .collect();
        tagged.shuffle(rng);

        let correct_index = tagged.iter().position(|(is_correct, _)| *is_correct)?;
        let answer_options = tagged.into_iter().map(|(_, answer)| answer).collect();

        Some(Self {
            question: decode_entities(&raw.question),
            correct_answer,
            answer_options,
            correct_index,
        })
    }

    /// 1-based option number of the correct answer, as announced on screen.
    pub fn correct_option_number(&self) -> usize {
        self.correct_index + 1
    }

    /// Narration for the options: "Option 1: A. Option 2: B. ..."
    pub fn options_narration(&self) -> String {
        self.answer_options
            .iter()
            .enumerate()
            .map(|(idx, answer)| format!("Option {}: {}", idx + 1, answer))
            .collect::<Vec<_>>()
            .join(". ")
    }

    /// Narration for the reveal.
    pub fn answer_narration(&self) -> String {
        format!("The correct answer is {}.", self.correct_answer)
    }

    /// On-screen text for the options and timer scenes.
    pub fn options_caption(&self) -> String {
        let options = self
            .answer_options
            .iter()
            .enumerate()
            .map(|(idx, answer)| format!("{}) {}", idx + 1, answer))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("{}\n\n{}", self.question, options)
    }

    /// On-screen text for the answer scene.
    pub fn answer_caption(&self) -> String {
        format!(
            "The correct answer is:\n\n{}\n(Option {})",
            self.correct_answer,
            self.correct_option_number()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn raw(correct: &str, incorrect: &[&str]) -> RawQuestion {
        RawQuestion {
            category: "Geography".to_string(),
            question_type: "multiple".to_string(),
            difficulty: "easy".to_string(),
            question: "What is the capital of &quot;France&quot;?".to_string(),
            correct_answer: correct.to_string(),
            incorrect_answers: incorrect.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_correct_index_tracks_answer() {
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let item =
                TriviaItem::from_raw(&raw("Paris", &["London", "Berlin", "Madrid"]), &mut rng)
                    .unwrap();
            assert_eq!(item.answer_options.len(), OPTION_COUNT);
            assert_eq!(item.answer_options[item.correct_index], item.correct_answer);
        }
    }

    #[test]
    fn test_entities_decoded() {
        let mut rng = StdRng::seed_from_u64(7);
        let item = TriviaItem::from_raw(
            &raw("Caf&eacute;", &["Bar &amp; Grill", "Pub", "Inn"]),
            &mut rng,
        )
        .unwrap();
        assert_eq!(item.question, "What is the capital of \"France\"?");
        assert_eq!(item.correct_answer, "Café");
        assert!(item.answer_options.contains(&"Bar & Grill".to_string()));
    }

    #[test]
    fn test_duplicate_answer_text_still_consistent() {
        let mut rng = StdRng::seed_from_u64(3);
        let item = TriviaItem::from_raw(&raw("Yes", &["Yes", "No", "Maybe"]), &mut rng).unwrap();
        assert_eq!(item.answer_options[item.correct_index], "Yes");
    }

    #[test]
    fn test_wrong_option_count_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(TriviaItem::from_raw(&raw("True", &["False"]), &mut rng).is_none());
    }

    #[test]
    fn test_captions_and_narration() {
        let item = TriviaItem {
            question: "Largest planet?".to_string(),
            correct_answer: "Jupiter".to_string(),
            answer_options: vec![
                "Mars".to_string(),
                "Jupiter".to_string(),
                "Venus".to_string(),
                "Earth".to_string(),
            ],
            correct_index: 1,
        };
        assert_eq!(
            item.options_narration(),
            "Option 1: Mars. Option 2: Jupiter. Option 3: Venus. Option 4: Earth"
        );
        assert_eq!(item.answer_narration(), "The correct answer is Jupiter.");
        assert_eq!(
            item.options_caption(),
            "Largest planet?\n\n1) Mars\n\n2) Jupiter\n\n3) Venus\n\n4) Earth"
        );
        assert_eq!(
            item.answer_caption(),
            "The correct answer is:\n\nJupiter\n(Option 2)"
        );
    }
}
