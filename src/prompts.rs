//! Prompt assembly for the generation backend.
//!
//! Every prompt the pipeline sends is built here, so wording lives in one
//! place. Prompts are bounded: document text and retrieved context are
//! clipped on character boundaries before being embedded, because one
//! oversized contract must not blow the backend's context window.

use crate::index::ReferenceChunk;

/// Behavioral contract sent as the system message on every call.
pub const SYSTEM_PROMPT: &str = "\
You are a legal assistant.
Translate complex legal language into plain words.
For each clause: produce a short explanation (1-2 sentences), a risk level (Low / Medium / High), and one short example.
Also generate 2-3 questions a person should ask a lawyer, and a short checklist of next steps.
Always add: \"Disclaimer: This is not legal advice.\"";

/// Byte budget for the document text inside a document-level prompt.
const DOCUMENT_BUDGET: usize = 12_000;
/// Byte budget for one clause inside a clause prompt.
const CLAUSE_BUDGET: usize = 4_000;
/// Byte budget for the retrieved-context block of a clause prompt.
const CONTEXT_BUDGET: usize = 3_000;

/// Per-clause analysis prompt, with retrieved law excerpts when available.
pub fn clause_prompt(clause_text: &str, references: &[ReferenceChunk]) -> String {
    let mut prompt = String::from(
        "Explain this contract clause in plain words.\n\
         Return one JSON object with keys: explanation, risk (Low/Medium/High), example, law_reference.\n\
         Use law_reference only when the excerpts below support it, otherwise leave it empty.\n",
    );
    if let Some(block) = reference_block(references) {
        prompt.push_str("\nRelevant law excerpts:\n");
        prompt.push_str(&clip(&block, CONTEXT_BUDGET));
        prompt.push('\n');
    }
    prompt.push_str("\nClause:\n");
    prompt.push_str(&clip(clause_text, CLAUSE_BUDGET));
    prompt
}

fn reference_block(references: &[ReferenceChunk]) -> Option<String> {
    if references.is_empty() {
        return None;
    }
    let mut block = String::new();
    for chunk in references {
        block.push_str("- [");
        block.push_str(&chunk.source);
        block.push_str("] ");
        block.push_str(chunk.content.trim());
        block.push('\n');
    }
    Some(block)
}

pub fn summary_prompt(document_text: &str) -> String {
    document_prompt("Give one short summary paragraph:", document_text)
}

pub fn lawyer_questions_prompt(document_text: &str) -> String {
    document_prompt("Suggest 3 simple questions to ask a lawyer:", document_text)
}

pub fn next_steps_prompt(document_text: &str) -> String {
    document_prompt("List 5 next actions (plain language):", document_text)
}

fn document_prompt(instruction: &str, document_text: &str) -> String {
    format!("{instruction}\n{}", clip(document_text, DOCUMENT_BUDGET))
}

/// Translation instruction for a block of already-generated output.
pub fn translation_prompt(text: &str, language_name: &str) -> String {
    format!(
        "Translate the following text into {language_name}. \
         Keep the plain, non-technical tone. Return only the translation.\n\n{text}"
    )
}

/// Clip `content` to roughly `max_bytes`, keeping the start and end and
/// eliding the middle. Cuts only on character boundaries.
fn clip(content: &str, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content.to_string();
    }

    let half = max_bytes / 2;
    let mut prefix_end = 0;
    for (idx, c) in content.char_indices() {
        let end = idx + c.len_utf8();
        if end <= half {
            prefix_end = end;
        } else {
            break;
        }
    }

    let mut suffix_start = content.len();
    let target = content.len().saturating_sub(half);
    for (idx, _) in content.char_indices().rev() {
        if idx >= target {
            suffix_start = idx;
        } else {
            break;
        }
    }
    if suffix_start < prefix_end {
        suffix_start = prefix_end;
    }

    format!(
        "{} ... [{} chars truncated] ... {}",
        &content[..prefix_end],
        suffix_start - prefix_end,
        &content[suffix_start..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_the_disclaimer() {
        assert!(SYSTEM_PROMPT.contains("Disclaimer: This is not legal advice."));
    }

    #[test]
    fn clause_prompt_includes_clause_and_requested_keys() {
        let prompt = clause_prompt("The tenant shall vacate within 30 days.", &[]);
        assert!(prompt.contains("The tenant shall vacate within 30 days."));
        assert!(prompt.contains("explanation, risk (Low/Medium/High), example, law_reference"));
        assert!(!prompt.contains("Relevant law excerpts"));
    }

    #[test]
    fn clause_prompt_renders_retrieved_excerpts() {
        let refs = vec![
            ReferenceChunk::new("rent_act.pdf", 0, "A landlord must give notice."),
            ReferenceChunk::new("rent_act.pdf", 1, "Deposits are refundable."),
        ];
        let prompt = clause_prompt("Deposit is forfeit on exit.", &refs);
        assert!(prompt.contains("Relevant law excerpts:"));
        assert!(prompt.contains("- [rent_act.pdf] A landlord must give notice."));
        assert!(prompt.contains("- [rent_act.pdf] Deposits are refundable."));
    }

    #[test]
    fn document_prompts_lead_with_their_instruction() {
        assert!(summary_prompt("text").starts_with("Give one short summary paragraph:"));
        assert!(
            lawyer_questions_prompt("text")
                .starts_with("Suggest 3 simple questions to ask a lawyer:")
        );
        assert!(next_steps_prompt("text").starts_with("List 5 next actions (plain language):"));
    }

    #[test]
    fn translation_prompt_names_language_and_carries_text() {
        let prompt = translation_prompt("Pay rent monthly.", "Hindi");
        assert!(prompt.contains("into Hindi"));
        assert!(prompt.ends_with("Pay rent monthly."));
    }

    #[test]
    fn clip_leaves_short_text_unchanged() {
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn clip_keeps_both_ends_of_long_text() {
        let long = format!("START{}END", "x".repeat(10_000));
        let clipped = clip(&long, 200);
        assert!(clipped.len() < long.len());
        assert!(clipped.starts_with("START"));
        assert!(clipped.ends_with("END"));
        assert!(clipped.contains("chars truncated"));
    }

    #[test]
    fn clip_respects_character_boundaries() {
        let long = "धारा".repeat(2_000);
        // Odd budget forces a cut inside a code point if bytes were used.
        let clipped = clip(&long, 301);
        assert!(clipped.contains("chars truncated"));
        assert!(clipped.chars().count() > 0);
    }
}
