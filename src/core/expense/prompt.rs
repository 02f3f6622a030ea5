// User prompt construction.
//
// The template is plain text with `{{categories}}` and `{{emails}}`
// placeholders. Substitution is literal string replacement - there is no
// template language, and placeholders that never match are left verbatim.

use super::models::EmailRecord;
use serde_json::json;

/// System prompt used when `OPENAI_PROMPT_DEFAULTS` is on and no explicit
/// instruction is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You extract expense data from emails. \
Return valid JSON only: an array with one object per email, each with keys: \
date, amount, category, description.";

/// User prompt counterpart of [`DEFAULT_SYSTEM_PROMPT`].
pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = "\
Categories: {{categories}}
Emails:
{{emails}}

Rules:
- Return one entry per email, in the same order as the input.
- Use the provided date when possible.
- amount should include currency symbol if present.
- category should be one of the provided categories when possible.
- description should be short and concrete.";

const NO_CATEGORIES_TEXT: &str = "No categories provided.";

const CATEGORIES_PLACEHOLDER: &str = "{{categories}}";
const EMAILS_PLACEHOLDER: &str = "{{emails}}";

/// Renders the user prompt for one batch. The email batch is serialized as
/// a JSON array in input order; categories are comma-joined.
pub fn build_user_prompt(emails: &[EmailRecord], categories: &[String], template: &str) -> String {
    let category_text = if categories.is_empty() {
        NO_CATEGORIES_TEXT.to_string()
    } else {
        categories.join(", ")
    };
    let batch_json = json!(emails).to_string();

    template
        .replace(CATEGORIES_PLACEHOLDER, &category_text)
        .replace(EMAILS_PLACEHOLDER, &batch_json)
}
