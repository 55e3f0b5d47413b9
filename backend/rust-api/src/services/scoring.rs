use std::collections::HashMap;

use crate::models::course::Question;

/// Result of evaluating one quiz submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: i32,
    pub passed: bool,
}

/// Score a submission against a quiz's question set.
///
/// `answers` maps question ids (ObjectId hex) to the chosen option letter.
/// A question with no answer, or with anything that is not exactly the
/// correct letter, earns zero points. The score is the earned percentage of
/// total points, floored; a quiz without questions scores 0.
pub fn score_submission(questions: &[Question], answers: &HashMap<String, String>) -> i32 {
    let mut total_points: i64 = 0;
    let mut earned_points: i64 = 0;

    for question in questions {
        total_points += i64::from(question.points);

        let submitted = question
            .id
            .map(|id| id.to_hex())
            .and_then(|id| answers.get(&id).map(String::as_str));

        if submitted == Some(question.correct_answer.as_str()) {
            earned_points += i64::from(question.points);
        }
    }

    if total_points > 0 {
        (earned_points * 100 / total_points) as i32
    } else {
        0
    }
}

/// Score a submission and compare against the quiz's pass mark.
pub fn evaluate(
    questions: &[Question],
    answers: &HashMap<String, String>,
    passing_score: i32,
) -> QuizOutcome {
    let score = score_submission(questions, answers);
    QuizOutcome {
        score,
        passed: score >= passing_score,
    }
}
