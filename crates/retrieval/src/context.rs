//! Context assembly for the generation prompt.
//!
//! The generation prompt anchors citations to the passage headers built
//! here, so the output must be byte-for-byte deterministic for a given
//! passage list: same passages in, same context out.

use crate::types::PassageMeta;

/// Separator between passages.
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Build the context string the answer is conditioned on.
///
/// Each passage is prefixed with a header naming its index, document,
/// section, and page, in the order the passages were returned.
pub fn build_context(passages: &[PassageMeta]) -> String {
    let parts: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| {
            format!(
                "[Passage {}: {}, {}, page {}]\n{}",
                i + 1,
                passage.document_name,
                passage.section_title,
                passage.page_number,
                passage.content
            )
        })
        .collect();

    parts.join(PASSAGE_SEPARATOR)
}
