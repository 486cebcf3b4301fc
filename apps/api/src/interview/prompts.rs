// LLM prompts and spoken scripts for the interview simulator.

/// System prompt for question generation.
pub const QUESTION_GEN_SYSTEM: &str = "You are an experienced hiring manager preparing \
    a spoken mock interview. Questions are read aloud, so keep each one to a single \
    sentence without lists, code, or formatting.";

/// Question generation prompt. Replace `{count}`, `{role_title}`, `{difficulty}`.
pub const QUESTION_GEN_PROMPT_TEMPLATE: &str = r#"Write {count} interview questions for a {difficulty} level {role_title} candidate.

Mix behavioral, situational, and role-specific technical questions, ordered from warm-up to hardest.

Return a JSON object with this EXACT schema:
{
  "questions": [
    "Tell me about a system you designed end to end."
  ]
}"#;

/// System prompt for performance evaluation.
pub const EVALUATION_SYSTEM: &str = "You are an interview coach scoring a transcribed \
    mock interview. Judge only what the candidate actually said. Answers recorded as \
    \"No response provided\" were skipped and count against completeness.";

/// Evaluation prompt. Replace `{role_title}`, `{difficulty}`, `{responses_json}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate this {difficulty} level {role_title} mock interview.

Each response has the question, the transcribed answer, and how long the candidate spoke in milliseconds:
{responses_json}

Return a JSON object with this EXACT schema:
{
  "overall_score": 0,
  "confidence": "Low | Moderate | High",
  "tone": "one or two words describing delivery",
  "answer_quality": "Poor | Fair | Good | Excellent",
  "strengths": ["specific strength"],
  "improvements": ["specific, actionable improvement"],
  "feedback": "Two or three sentences of overall feedback."
}

overall_score is an integer from 0 to 100. Give two to four strengths and two to four improvements."#;

/// Spoken before the first question. Replace `{role_title}`.
pub const OPENING_SCRIPT: &str = "Hello, and welcome to your mock interview for the \
    {role_title} position. Answer each question out loud, and use the next button when \
    you are done. Let's begin. ";

/// Spoken before every question after the first.
pub const TRANSITION_SCRIPT: &str = "Thank you. Next question. ";

/// Spoken once the last answer is recorded.
pub const CLOSING_SCRIPT: &str = "That concludes the interview. Thank you for your time. \
    I'm preparing your feedback now.";
