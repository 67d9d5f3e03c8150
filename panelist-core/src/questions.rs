//! Question generation prompts and the line-oriented response parser.
//!
//! The provider is asked for numbered questions, one per line. The
//! response is freeform text, so the parser is deliberately lenient
//! about numbering style ("1.", "2)", "3 -", ...) and drops any line
//! that reduces to nothing once the marker is stripped.

/// How many questions one interview asks.
pub const QUESTION_COUNT: usize = 5;

/// System prompt for question generation (temperature 0.4 at the call site).
pub const INTERVIEWER_SYSTEM_PROMPT: &str = "\
You are an expert technical interviewer.
Generate clear, concise interview questions.
Ask only one question at a time.
Make questions specific to the job description provided.";

/// Build the user prompt embedding the job description.
pub fn question_prompt(job_description: &str) -> String {
    format!(
        "Based on the following Job Description, generate exactly {} interview questions.\n\
         Questions should be technical and role-specific.\n\
         Make them clear and conversational.\n\
         \n\
         Job Description:\n\
         {}\n\
         \n\
         Return ONLY the numbered questions, one per line.",
        QUESTION_COUNT, job_description
    )
}

/// Parse the provider's freeform numbered text into a question list.
///
/// Each non-empty line has its leading numeric/punctuation marker
/// stripped. Lines that are empty after stripping are dropped, not
/// replaced with a placeholder. The result is truncated to
/// [`QUESTION_COUNT`].
pub fn parse_questions(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            let stripped = strip_list_marker(line.trim());
            if stripped.is_empty() {
                None
            } else {
                Some(stripped.to_string())
            }
        })
        .take(QUESTION_COUNT)
        .collect()
}

/// Strip a leading "1.", "2)", "3 -" style marker from one line.
fn strip_list_marker(line: &str) -> &str {
    let without_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == line.len() {
        // No leading number; leave the line untouched.
        return line;
    }
    without_digits
        .trim_start_matches(|c: char| matches!(c, '.' | ')' | ':' | '-' | ' '))
        .trim()
}
