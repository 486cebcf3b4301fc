//! Remote collaborators of the interview controller.
//!
//! Both are traits so the controller never knows which backend it talks to.
//! The default backends call the LLM; tests plug in in-memory fakes.
//! Failures are returned as errors here and turned into fallback content by
//! the controller, never by the backends themselves.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::interview::models::{InterviewTarget, PerformanceReport, ResponseRecord};
use crate::interview::prompts::{
    EVALUATION_PROMPT_TEMPLATE, EVALUATION_SYSTEM, QUESTION_GEN_PROMPT_TEMPLATE,
    QUESTION_GEN_SYSTEM,
};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::LlmClient;

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_questions(
        &self,
        target: &InterviewTarget,
        count: usize,
    ) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait PerformanceEvaluator: Send + Sync {
    async fn analyze_performance(
        &self,
        target: &InterviewTarget,
        responses: &[ResponseRecord],
    ) -> Result<PerformanceReport, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM question generator
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmQuestionGenerator(pub LlmClient);

/// Models answer with either `{"questions": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionSet {
    Wrapped { questions: Vec<String> },
    Bare(Vec<String>),
}

impl QuestionSet {
    fn into_questions(self) -> Vec<String> {
        match self {
            QuestionSet::Wrapped { questions } | QuestionSet::Bare(questions) => questions,
        }
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate_questions(
        &self,
        target: &InterviewTarget,
        count: usize,
    ) -> Result<Vec<String>, AppError> {
        let prompt = QUESTION_GEN_PROMPT_TEMPLATE
            .replace("{count}", &count.to_string())
            .replace("{role_title}", &target.role_title)
            .replace("{difficulty}", &target.difficulty);
        let system = format!("{QUESTION_GEN_SYSTEM} {JSON_ONLY_INSTRUCTION}");

        let set: QuestionSet = self
            .0
            .call_json(&prompt, &system)
            .await
            .map_err(|e| AppError::Llm(format!("Question generation failed: {e}")))?;

        clean_questions(set)
    }
}

/// Trims entries and drops blanks. An empty result is an error.
fn clean_questions(set: QuestionSet) -> Result<Vec<String>, AppError> {
    let questions: Vec<String> = set
        .into_questions()
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if questions.is_empty() {
        return Err(AppError::Llm("Question list was empty".to_string()));
    }
    Ok(questions)
}

// ────────────────────────────────────────────────────────────────────────────
// LLM performance evaluator
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmPerformanceEvaluator(pub LlmClient);

/// Lenient mirror of `PerformanceReport`: models sometimes emit fractional
/// or out-of-range scores and omit optional prose.
#[derive(Debug, Deserialize)]
struct RawReport {
    overall_score: f64,
    #[serde(default)]
    confidence: String,
    #[serde(default)]
    tone: String,
    #[serde(default)]
    answer_quality: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    feedback: String,
}

impl From<RawReport> for PerformanceReport {
    fn from(raw: RawReport) -> Self {
        let score = if raw.overall_score.is_finite() {
            raw.overall_score.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        PerformanceReport {
            overall_score: score,
            confidence: raw.confidence,
            tone: raw.tone,
            answer_quality: raw.answer_quality,
            strengths: raw.strengths,
            improvements: raw.improvements,
            feedback: raw.feedback,
        }
    }
}

#[async_trait]
impl PerformanceEvaluator for LlmPerformanceEvaluator {
    async fn analyze_performance(
        &self,
        target: &InterviewTarget,
        responses: &[ResponseRecord],
    ) -> Result<PerformanceReport, AppError> {
        let responses_json = serde_json::to_string_pretty(responses)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize responses: {e}")))?;
        let prompt = EVALUATION_PROMPT_TEMPLATE
            .replace("{role_title}", &target.role_title)
            .replace("{difficulty}", &target.difficulty)
            .replace("{responses_json}", &responses_json);
        let system = format!("{EVALUATION_SYSTEM} {JSON_ONLY_INSTRUCTION}");

        let raw: RawReport = self
            .0
            .call_json(&prompt, &system)
            .await
            .map_err(|e| AppError::Llm(format!("Performance evaluation failed: {e}")))?;

        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::parse_json_reply;

    fn parse_questions(text: &str) -> Result<Vec<String>, AppError> {
        let set: QuestionSet =
            parse_json_reply(text).map_err(|e| AppError::Llm(e.to_string()))?;
        clean_questions(set)
    }

    fn parse_report(text: &str) -> Result<PerformanceReport, AppError> {
        let raw: RawReport = parse_json_reply(text).map_err(|e| AppError::Llm(e.to_string()))?;
        Ok(raw.into())
    }

    #[test]
    fn test_parse_questions_wrapped_object() {
        let text = r#"{"questions": ["Why this role?", "  Describe a failure.  "]}"#;
        let questions = parse_questions(text).unwrap();
        assert_eq!(questions, vec!["Why this role?", "Describe a failure."]);
    }

    #[test]
    fn test_parse_questions_bare_array_in_fence() {
        let text = "```json\n[\"One?\", \"\", \"Two?\"]\n```";
        let questions = parse_questions(text).unwrap();
        assert_eq!(questions, vec!["One?", "Two?"]);
    }

    #[test]
    fn test_parse_questions_empty_list_is_an_error() {
        assert!(parse_questions(r#"{"questions": ["   "]}"#).is_err());
    }

    #[test]
    fn test_parse_questions_prose_is_an_error() {
        assert!(parse_questions("Here are some questions: why, how, when").is_err());
    }

    #[test]
    fn test_parse_report_full_payload() {
        let text = r#"Here is the evaluation:
        {
            "overall_score": 82,
            "confidence": "High",
            "tone": "Calm",
            "answer_quality": "Good",
            "strengths": ["Clear structure"],
            "improvements": ["Quantify impact"],
            "feedback": "Solid interview."
        }"#;
        let report = parse_report(text).unwrap();
        assert_eq!(report.overall_score, 82);
        assert_eq!(report.confidence, "High");
        assert_eq!(report.strengths, vec!["Clear structure"]);
    }

    #[test]
    fn test_parse_report_clamps_and_rounds_score() {
        let high = parse_report(r#"{"overall_score": 140}"#).unwrap();
        assert_eq!(high.overall_score, 100);

        let low = parse_report(r#"{"overall_score": -3}"#).unwrap();
        assert_eq!(low.overall_score, 0);

        let fractional = parse_report(r#"{"overall_score": 67.6}"#).unwrap();
        assert_eq!(fractional.overall_score, 68);
    }

    #[test]
    fn test_parse_report_requires_score() {
        assert!(parse_report(r#"{"feedback": "Great"}"#).is_err());
    }
}
