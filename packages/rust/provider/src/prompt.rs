//! Summary prompt construction and model-output parsing.
//!
//! Both provider backends send the same strict-JSON prompt and run the
//! same response cleanup: strip markdown code fences, parse, and fall
//! back to a degraded-but-valid result when the model ignored the
//! format instructions.

use newsloom_shared::SummaryResult;
use tracing::warn;

/// Character cap applied to article text before summarization.
pub(crate) const SUMMARIZE_INPUT_CAP: usize = 10_000;

/// The closed category set the prompt offers the model.
pub const CATEGORIES: [&str; 8] = [
    "Politics",
    "Economy",
    "Sports",
    "Technology",
    "Entertainment",
    "Local",
    "Disaster",
    "Other",
];

/// Category used by the degraded fallback when the response is not JSON.
pub const FALLBACK_CATEGORY: &str = "General";

/// Build the summarization prompt for one article body.
pub(crate) fn build_summary_prompt(text: &str) -> String {
    format!(
        "System: You are a professional news editor and sentiment analyst.\n\
         Task:\n\
         1. Summarize the following news article into 3 concise bullet points in English.\n\
         2. Analyze the sentiment of the article and assign a score between 0.0 (Negative/Disaster) and 1.0 (Positive/Development).\n\
         3. Categorize the article into ONE of the following: {}.\n\
         \n\
         Constraints:\n\
         - Output MUST be a valid JSON object.\n\
         - Keys: \"summary\" (string bullet points), \"sentiment_score\" (float), \"category\" (string).\n\
         - Start each bullet point in the summary with \"* \".\n\
         - Do NOT include markdown code blocks (```json ... ```). Just the raw JSON string.\n\
         \n\
         Article:\n\
         {}\n\
         \n\
         Output JSON:",
        CATEGORIES.join(", "),
        text,
    )
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strip a markdown code fence wrapper, if the model added one anyway.
pub(crate) fn strip_code_fences(content: &str) -> &str {
    let s = content.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_prefix("```").unwrap_or(s);
    let s = s.trim_end();
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Parse a model reply into a [`SummaryResult`].
///
/// Never fails: a reply that is not valid JSON becomes the degraded
/// result `{summary: <raw text>, sentiment_score: 0.5, category:
/// "General"}`, persisted as if it were a success.
pub(crate) fn parse_summary_text(raw: &str) -> SummaryResult {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<SummaryResult>(cleaned) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "summary response was not valid JSON, using degraded fallback");
            SummaryResult {
                summary: cleaned.to_string(),
                sentiment_score: 0.5,
                category: FALLBACK_CATEGORY.into(),
            }
        }
    }
}
