//! Extraction prompt.

use crate::chunking::TextChunk;

/// Fixed system prompt for every chunk.
pub const SYSTEM_PROMPT: &str = r#"You analyze pages from public court and government records and extract structured facts.

Respond with a single JSON object and nothing else. No markdown, no commentary. Use exactly this shape:
{
  "documentType": "deposition | flight log | email | court filing | police report | fbi report | financial record | correspondence | government record",
  "dateOriginal": "YYYY-MM-DD or null",
  "summary": "2-3 neutral sentences describing the document",
  "persons": [
    {"name": "Full Name", "role": "role in this document", "category": "principal | associate | legal | official | law enforcement | witness | staff | other", "context": "short quote or paraphrase", "mentionCount": 1}
  ],
  "connections": [
    {"person1": "Full Name", "person2": "Full Name", "relationshipType": "associate | employer | employee | attorney | client | travel companion | correspondent | other", "description": "how the document links them", "strength": 1}
  ],
  "events": [
    {"date": "YYYY-MM-DD or as written", "title": "short title", "description": "what happened", "category": "legal | travel | meeting | financial | communication | other", "significance": 1, "personsInvolved": ["Full Name"]}
  ],
  "locations": ["Place name"],
  "keyFacts": ["One factual statement per entry"]
}

Rules:
- Only include people who are named in the text. Never include redacted names, placeholders, or descriptors such as "[REDACTED]", "Jane Doe", "Victim 1", "Minor Victim", "Witness A", or "Unknown".
- Organizations, companies, agencies, and courts are never persons.
- Use each person's fullest name as written in the text.
- strength and significance are integers from 1 (weak/minor) to 5 (strong/major).
- Connections must name two different people who both appear in persons.
- Do not speculate beyond what the text states. Use empty arrays when nothing applies."#;

/// User message for one chunk.
pub fn build_user_prompt(chunk: &TextChunk) -> String {
    let pages = if chunk.first_page == chunk.last_page {
        format!("page {}", chunk.first_page)
    } else {
        format!("pages {}-{}", chunk.first_page, chunk.last_page)
    };
    format!(
        "Document excerpt {} of {} ({}):\n\n{}",
        chunk.chunk_index + 1,
        chunk.total_chunks,
        pages,
        chunk.text
    )
}
