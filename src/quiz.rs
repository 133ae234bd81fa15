// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EMBARALHAMENTO DE QUIZ
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Fisher–Yates sobre as alternativas, acompanhando para onde foi a
// alternativa correta. Com seed, o resultado é reprodutível (simulados
// ENEM precisam gerar a mesma prova para o mesmo aluno).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Letras das alternativas (até 5, padrão ENEM)
pub const LETTERS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("Question has no options")]
    EmptyOptions,

    #[error("Correct index {index} out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// Questão de múltipla escolha
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Índice da alternativa correta em `options`
    pub correct: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct).map(String::as_str)
    }

    pub fn correct_letter(&self) -> Option<char> {
        index_to_letter(self.correct)
    }
}

/// 0 → 'A', ..., 4 → 'E'
pub fn index_to_letter(index: usize) -> Option<char> {
    LETTERS.get(index).copied()
}

/// 'A'/'a' → 0, ..., 'E'/'e' → 4
pub fn letter_to_index(letter: char) -> Option<usize> {
    let upper = letter.to_ascii_uppercase();
    LETTERS.iter().position(|l| *l == upper)
}

/// Embaralha as alternativas e retorna (novas alternativas, novo índice correto).
pub fn shuffle_options<T, R: Rng + ?Sized>(
    options: &[T],
    correct_index: usize,
    rng: &mut R,
) -> Result<(Vec<T>, usize), QuizError>
where
    T: Clone,
{
    if options.is_empty() {
        return Err(QuizError::EmptyOptions);
    }
    if correct_index >= options.len() {
        return Err(QuizError::CorrectIndexOutOfRange {
            index: correct_index,
            len: options.len(),
        });
    }

    let mut shuffled = options.to_vec();
    let mut correct = correct_index;

    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
        if correct == i {
            correct = j;
        } else if correct == j {
            correct = i;
        }
    }

    Ok((shuffled, correct))
}

pub fn shuffle_question<R: Rng + ?Sized>(
    question: &QuizQuestion,
    rng: &mut R,
) -> Result<QuizQuestion, QuizError> {
    let (options, correct) = shuffle_options(&question.options, question.correct, rng)?;
    Ok(QuizQuestion {
        options,
        correct,
        ..question.clone()
    })
}

/// Embaralha todas as questões. `seed` torna o resultado determinístico.
pub fn shuffle_quiz(questions: &[QuizQuestion], seed: Option<u64>) -> Result<Vec<QuizQuestion>, QuizError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let shuffled = questions
        .iter()
        .map(|q| shuffle_question(q, &mut rng))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("🔀 [QUIZ] {} questões embaralhadas (seed={:?})", shuffled.len(), seed);
    Ok(shuffled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuizQuestion {
        QuizQuestion {
            question: "Qual é a unidade de corrente elétrica?".into(),
            options: vec!["Volt".into(), "Ampère".into(), "Ohm".into(), "Watt".into()],
            correct: 1,
            explanation: None,
        }
    }

    #[test]
    fn test_shuffle_preserves_correct_answer_text() {
        let question = sample();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_question(&question, &mut rng).unwrap();
            assert_eq!(shuffled.correct_option(), Some("Ampère"));
            assert_eq!(shuffled.options.len(), 4);
        }
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut shuffled, _) = shuffle_options(&[1, 2, 3, 4, 5], 0, &mut rng).unwrap();
        shuffled.sort();
        assert_eq!(shuffled, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_seeded_quiz_is_reproducible() {
        let quiz = vec![sample(), sample(), sample()];
        let a = shuffle_quiz(&quiz, Some(42)).unwrap();
        let b = shuffle_quiz(&quiz, Some(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_correct_index_moves_eventually() {
        let question = sample();
        let moved = (0..50).any(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            shuffle_question(&question, &mut rng).unwrap().correct != 1
        });
        assert!(moved);
    }

    #[test]
    fn test_invalid_inputs() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: [&str; 0] = [];
        assert_eq!(shuffle_options(&empty, 0, &mut rng), Err(QuizError::EmptyOptions));
        assert_eq!(
            shuffle_options(&["a", "b"], 2, &mut rng),
            Err(QuizError::CorrectIndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_letter_helpers() {
        assert_eq!(index_to_letter(0), Some('A'));
        assert_eq!(index_to_letter(4), Some('E'));
        assert_eq!(index_to_letter(5), None);
        assert_eq!(letter_to_index('c'), Some(2));
        assert_eq!(letter_to_index('Z'), None);
        assert_eq!(sample().correct_letter(), Some('B'));
    }
}
