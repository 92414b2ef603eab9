//! LLM prompt construction for field extraction

use crate::types::FieldSpec;
use fieldex_domain::CompletionRequest;
use serde::Serialize;

/// Builds the system and user messages for one batch
pub struct PromptBuilder<'a> {
    fields: &'a [FieldSpec],
    context: &'a str,
    domain: Option<&'a str>,
}

#[derive(Serialize)]
struct QuestionEntry<'a> {
    id: &'a str,
    question: &'a str,
}

impl<'a> PromptBuilder<'a> {
    /// Create a prompt builder for a batch and its packed context
    pub fn new(fields: &'a [FieldSpec], context: &'a str) -> Self {
        Self {
            fields,
            context,
            domain: None,
        }
    }

    /// Specialise the instructions for a subject area (e.g. "medical")
    pub fn with_domain(mut self, domain: Option<&'a str>) -> Self {
        self.domain = domain.map(str::trim).filter(|d| !d.is_empty());
        self
    }

    /// System instruction
    pub fn system(&self) -> String {
        let role = match self.domain {
            Some(domain) => format!("You are an expert assistant for {} data extraction.", domain),
            None => "You are an expert assistant for structured data extraction.".to_string(),
        };
        format!("{}\n\n{}", role, EXTRACTION_INSTRUCTIONS)
    }

    /// User message: the context block followed by the question list
    pub fn user(&self) -> String {
        let questions: Vec<QuestionEntry<'_>> = self
            .fields
            .iter()
            .map(|f| QuestionEntry {
                id: &f.id,
                question: &f.question,
            })
            .collect();
        // Serializing borrowed strings into a Vec cannot fail
        let questions =
            serde_json::to_string_pretty(&questions).unwrap_or_else(|_| "[]".to_string());

        let mut prompt = String::new();
        prompt.push_str("DOCUMENT CONTEXT:\n\"\"\"\n");
        prompt.push_str(self.context);
        prompt.push_str("\n\"\"\"\n\n");
        prompt.push_str("QUESTIONS:\n");
        prompt.push_str(&questions);
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_FORMAT_REMINDER);
        prompt
    }

    /// Build the complete chat request
    pub fn build(&self, temperature: f32, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            system: self.system(),
            user: self.user(),
            temperature,
            max_tokens,
        }
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"INSTRUCTIONS:
1. Analyse the document context provided by the user.
2. Return a JSON object containing a list under the key "fields".
3. For each question received, create one object with:
   - "id": the identifier given with the question.
   - "value": the precise extracted answer (null if not found).
   - "type_guided": the expected type or normalised form of the answer.
   - "source_quote": the exact sentence from the text that justifies the answer (null if not found).
4. If a list is requested (e.g. medications), include every item.
5. Write the whole JSON on a single line, without raw line breaks inside strings.

EXPECTED RESPONSE FORMAT (JSON only):
{"fields": [{"id": "X.Y", "value": "Answer...", "type_guided": "string", "source_quote": "Quote..."}]}"#;

const OUTPUT_FORMAT_REMINDER: &str = "Return only valid JSON.";
