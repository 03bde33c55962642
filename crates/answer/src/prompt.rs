//! Prompt assembly and citation extraction.
//!
//! The citation marker is the only machine-parseable signal extracted
//! from free-text model output; the system prompt and the extractor
//! must agree on it even if the rest of the template changes.

use pollkit_llm::ChatMessage;

/// Marker that opens the citation line at the end of every answer.
pub const SOURCE_MARKER: &str = "📄 Source:";

/// Build the system instruction, with the retrieved context inlined.
pub fn build_system_prompt(context: &str, language: &str) -> String {
    let mut prompt = String::from(
        "You are an assistant for poll workers and election officials. \
         Answer questions about election procedures using only the \
         provided reference material.\n\n",
    );

    if context.is_empty() {
        prompt.push_str(
            "No reference material was found for this question. If you cannot \
             answer from general election procedure, say so plainly and direct \
             the user to their election supervisor.\n\n",
        );
    } else {
        prompt.push_str("Reference material:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!(
        "Instructions:\n\
         - Answer in {}.\n\
         - Be concise and factual; these answers are read aloud at polling places.\n\
         - Do not mention passages, retrieval, or reference numbers in your answer.\n\
         - End your answer with exactly one line of the form:\n\
           {} <document name, section>\n\
         - If the reference material does not contain the answer, say you could \
           not find it and omit the source line.\n",
        language, SOURCE_MARKER
    ));

    prompt
}

/// Assemble the full conversation: system, prior turns, new question.
pub fn build_messages(
    question: &str,
    language: &str,
    history: &[ChatMessage],
    context: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(build_system_prompt(context, language)));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(question));
    messages
}

/// Extract the cited source from a completed answer.
///
/// Looks at the last non-empty line; if it starts with the source
/// marker, the trimmed remainder is the citation. Otherwise returns an
/// empty string — the answer did not properly cite and callers may
/// treat it as lower-confidence.
pub fn extract_cited_source(answer: &str) -> String {
    let Some(last_line) = answer.lines().rev().find(|line| !line.trim().is_empty()) else {
        return String::new();
    };

    last_line
        .trim()
        .strip_prefix(SOURCE_MARKER)
        .map(|rest| rest.trim().to_string())
        .unwrap_or_default()
}
