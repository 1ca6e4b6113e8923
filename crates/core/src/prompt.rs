//! Prompt templates for the standalone-question and answer stages.

use crate::PipelineError;

pub const STANDALONE_QUESTION_TEMPLATE: &str = "Given some conversation history (if any) and a question,
 convert the question to a standalone question.
 conversation history: {conv_history}
 question: {question}
 standalone question:";

pub const ANSWER_TEMPLATE: &str = concat!(
    "\n",
    "Prompt:\n",
    "As a medical assistant knowledgeable about NABH standards, \n",
    "your goal is to provide accurate answers to questions raised by the end user. \n",
    "You should rely on the context provided and refer to the conversation history when \n",
    "necessary to ensure the correctness of your responses. Avoid fabricating information; \n",
    "if uncertain, humbly seek advice from a human and maintain a friendly demeanor throughout. \n",
    "Your role is to assist as a reliable source of information while maintaining a \n",
    "supportive and approachable tone. Remember to prioritize accuracy and clarity in your responses.\n",
    "context: {context}\n",
    "question: {question}\n",
    "conversation history: {conv_history}\n",
    "answer: ",
);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A text template with `{name}` placeholders. `{{` and `}}` produce literal
/// braces. Values are inserted verbatim and never re-scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(character) = chars.next() {
            match character {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }

                    if closed && is_identifier(&name) {
                        if !literal.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal)));
                        }
                        segments.push(Segment::Placeholder(name));
                    } else {
                        literal.push('{');
                        literal.push_str(&name);
                        if closed {
                            literal.push('}');
                        }
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn format(&self, values: &[(&str, &str)]) -> Result<String, PipelineError> {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| *key == name.as_str())
                        .map(|(_, value)| *value)
                        .ok_or_else(|| PipelineError::Template(name.clone()))?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_template_keeps_line_endings() {
        let lines = ANSWER_TEMPLATE.split('\n').collect::<Vec<_>>();
        assert_eq!(lines[0], "");
        assert!(lines[2].ends_with("NABH standards, "));
        assert!(lines[8].ends_with("in your responses."));
        assert_eq!(lines.last(), Some(&"answer: "));
    }

    #[test]
    fn default_templates_expose_expected_placeholders() {
        let standalone = PromptTemplate::new(STANDALONE_QUESTION_TEMPLATE);
        assert_eq!(
            standalone.placeholders().collect::<Vec<_>>(),
            vec!["conv_history", "question"]
        );

        let answer = PromptTemplate::new(ANSWER_TEMPLATE);
        assert_eq!(
            answer.placeholders().collect::<Vec<_>>(),
            vec!["context", "question", "conv_history"]
        );
    }

    #[test]
    fn values_are_not_rescanned() -> Result<(), PipelineError> {
        let template = PromptTemplate::new("q: {question} h: {conv_history}");
        let rendered = template.format(&[("question", "what is {conv_history}?"), ("conv_history", "")])?;
        assert_eq!(rendered, "q: what is {conv_history}? h: ");
        Ok(())
    }

    #[test]
    fn missing_value_is_an_error() {
        let template = PromptTemplate::new("context: {context}");
        let result = template.format(&[("question", "x")]);
        assert!(matches!(result, Err(PipelineError::Template(name)) if name == "context"));
    }

    #[test]
    fn escaped_and_unmatched_braces_stay_literal() -> Result<(), PipelineError> {
        let template = PromptTemplate::new("{{json}} {not a name} {open");
        assert_eq!(template.placeholders().count(), 0);
        assert_eq!(template.format(&[])?, "{json} {not a name} {open");
        Ok(())
    }
}
