//! Evaluation prompt construction and strict decoding of the result.
//!
//! The evaluator is instructed to return bare JSON, but models routinely
//! wrap output in a Markdown code fence anyway, so decoding strips an
//! optional leading/trailing fence first. Anything that still fails
//! strict decoding is a [`EvaluationParseError`] surfaced to the caller,
//! never silently defaulted: a malformed response is a contract
//! violation from the provider, not unavailability.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Temperature for the evaluation call. Low, since we want strict JSON.
pub const EVALUATION_TEMPERATURE: f32 = 0.2;

/// System prompt for the evaluation call.
pub const EVALUATOR_SYSTEM_PROMPT: &str =
    "You are a strict evaluator. Return only valid JSON.";

const MAX_SCORE: u8 = 10;

/// One question/answer exchange from an interview session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Hiring recommendation, restricted to the three allowed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Yes,
    Maybe,
    No,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Yes => write!(f, "Yes"),
            Recommendation::Maybe => write!(f, "Maybe"),
            Recommendation::No => write!(f, "No"),
        }
    }
}

/// Structured evaluation of one interview. Scores are 0-10 inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub technical_score: u8,
    pub communication_score: u8,
    pub overall_score: u8,
    pub recommendation: Recommendation,
    pub feedback: String,
}

/// Decoding failure for an evaluation response.
#[derive(Debug)]
pub enum EvaluationParseError {
    /// The response was not valid JSON matching the expected shape.
    Malformed(String),
    /// A score field decoded but fell outside 0-10.
    ScoreOutOfRange { field: &'static str, value: u8 },
}

impl fmt::Display for EvaluationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationParseError::Malformed(detail) => {
                write!(f, "evaluation response is not valid JSON: {}", detail)
            }
            EvaluationParseError::ScoreOutOfRange { field, value } => {
                write!(f, "evaluation {} is {}, outside 0-10", field, value)
            }
        }
    }
}

impl std::error::Error for EvaluationParseError {}

/// Build the single combined evaluation prompt from the full transcript.
pub fn evaluation_prompt(transcript: &[QaPair]) -> String {
    let mut combined = String::new();
    for (idx, qa) in transcript.iter().enumerate() {
        let n = idx + 1;
        combined.push_str(&format!("\nQ{}: {}\nA{}: {}\n", n, qa.question, n, qa.answer));
    }

    format!(
        "You are a senior technical interview evaluator.\n\
         Evaluate the candidate based on their answers.\n\
         \n\
         STRICT RULES:\n\
         - Return ONLY valid JSON (no markdown, no extra text)\n\
         - All scores MUST be integers 0-10\n\
         - Recommendation MUST be: \"Yes\", \"Maybe\", or \"No\"\n\
         \n\
         Interview:\n\
         {}\n\
         Return this JSON format exactly:\n\
         {{\n\
           \"technical_score\": 0,\n\
           \"communication_score\": 0,\n\
           \"overall_score\": 0,\n\
           \"recommendation\": \"Yes\",\n\
           \"feedback\": \"Brief evaluation\"\n\
         }}",
        combined
    )
}

/// Strip an optional Markdown code fence (with or without a language
/// tag) wrapping the response. Content without a fence passes through
/// untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the rest of the fence line (e.g. a "json" tag).
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Decode a provider response into an [`EvaluationResult`].
pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, EvaluationParseError> {
    let result: EvaluationResult = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| EvaluationParseError::Malformed(e.to_string()))?;

    for (field, value) in [
        ("technical_score", result.technical_score),
        ("communication_score", result.communication_score),
        ("overall_score", result.overall_score),
    ] {
        if value > MAX_SCORE {
            return Err(EvaluationParseError::ScoreOutOfRange { field, value });
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
        "technical_score": 7,
        "communication_score": 8,
        "overall_score": 7,
        "recommendation": "Yes",
        "feedback": "Solid fundamentals."
    }"#;

    fn transcript() -> Vec<QaPair> {
        vec![
            QaPair {
                question: "What is X?".to_string(),
                answer: "X is a thing.".to_string(),
            },
            QaPair {
                question: "Explain Y".to_string(),
                answer: "Y follows from X.".to_string(),
            },
        ]
    }

    #[test]
    fn parses_bare_json() {
        let result = parse_evaluation(VALID_JSON).unwrap();
        assert_eq!(result.technical_score, 7);
        assert_eq!(result.recommendation, Recommendation::Yes);
        assert_eq!(result.feedback, "Solid fundamentals.");
    }

    #[test]
    fn fenced_response_decodes_identically_to_unwrapped() {
        let fenced = format!("```json\n{}\n```", VALID_JSON);
        assert_eq!(
            parse_evaluation(&fenced).unwrap(),
            parse_evaluation(VALID_JSON).unwrap()
        );

        let plain_fence = format!("```\n{}\n```", VALID_JSON);
        assert_eq!(
            parse_evaluation(&plain_fence).unwrap(),
            parse_evaluation(VALID_JSON).unwrap()
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_evaluation("The candidate did well overall.").unwrap_err();
        assert!(matches!(err, EvaluationParseError::Malformed(_)));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let raw = r#"{
            "technical_score": 11,
            "communication_score": 8,
            "overall_score": 7,
            "recommendation": "Maybe",
            "feedback": "ok"
        }"#;
        let err = parse_evaluation(raw).unwrap_err();
        assert!(matches!(
            err,
            EvaluationParseError::ScoreOutOfRange {
                field: "technical_score",
                value: 11
            }
        ));
    }

    #[test]
    fn unknown_recommendation_is_rejected() {
        let raw = r#"{
            "technical_score": 5,
            "communication_score": 5,
            "overall_score": 5,
            "recommendation": "Strong Yes",
            "feedback": "ok"
        }"#;
        assert!(parse_evaluation(raw).is_err());
    }

    #[test]
    fn prompt_numbers_every_exchange() {
        let prompt = evaluation_prompt(&transcript());
        assert!(prompt.contains("Q1: What is X?"));
        assert!(prompt.contains("A2: Y follows from X."));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }

    #[test]
    fn fence_without_closing_marker_still_decodes() {
        let fenced = format!("```json\n{}", VALID_JSON);
        assert_eq!(
            parse_evaluation(&fenced).unwrap(),
            parse_evaluation(VALID_JSON).unwrap()
        );
    }
}
