use chatdesk_core::{Message, Sender};
use std::borrow::Cow;
use std::fmt::Write;

use crate::knowledge::DEFAULT_KNOWLEDGE;

/// Prior turns rendered into the transcript block.
pub const TRANSCRIPT_WINDOW: usize = 5;

/// Longest question, in characters, placed into a prompt.
pub const MAX_QUESTION_CHARS: usize = 2000;

const ELLIPSIS: &str = "...";

/// Assembles the text sent to the language model: knowledge block, recent
/// transcript, then the current question.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    knowledge: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWLEDGE)
    }
}

impl PromptBuilder {
    pub fn new(knowledge: impl Into<String>) -> Self {
        Self {
            knowledge: knowledge.into(),
        }
    }

    pub fn knowledge(&self) -> &str {
        &self.knowledge
    }

    pub fn build(&self, history: &[Message], current: &str) -> String {
        let question = truncate_chars(current, MAX_QUESTION_CHARS);
        let window = &history[history.len().saturating_sub(TRANSCRIPT_WINDOW)..];

        let mut prompt = String::with_capacity(self.knowledge.len() + question.len() + 512);
        prompt.push_str(&self.knowledge);
        prompt.push_str("\n\n");

        if !window.is_empty() {
            prompt.push_str("Previous conversation:\n");
            for message in window {
                // Writing into a String cannot fail.
                let _ = writeln!(prompt, "{}: {}", speaker(message.sender), message.text);
            }
            prompt.push('\n');
        }

        let _ = write!(
            prompt,
            "Respond as a helpful support agent to the customer's current question: {question}"
        );
        prompt
    }
}

fn speaker(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "Customer",
        Sender::Ai => "Support Agent",
    }
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], ELLIPSIS)),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(sender: Sender, text: &str) -> Message {
        Message::new(Default::default(), sender, text)
    }

    fn transcript_lines(prompt: &str) -> Vec<&str> {
        prompt
            .split_once("Previous conversation:\n")
            .map(|(_, rest)| rest.split("\n\n").next().unwrap_or_default())
            .map(|block| block.lines().collect())
            .unwrap_or_default()
    }

    #[test]
    fn knowledge_comes_first_and_question_last() {
        let builder = PromptBuilder::new("KNOWLEDGE");
        let prompt = builder.build(&[], "Where is my order?");
        assert!(prompt.starts_with("KNOWLEDGE\n\n"));
        assert!(prompt.ends_with("Where is my order?"));
        assert!(!prompt.contains("Previous conversation:"));
    }

    #[test]
    fn transcript_labels_speakers() {
        let builder = PromptBuilder::new("K");
        let history = vec![
            turn(Sender::User, "Do you ship to Canada?"),
            turn(Sender::Ai, "Yes, in 7-10 business days."),
        ];
        let prompt = builder.build(&history, "How much?");
        assert_eq!(
            transcript_lines(&prompt),
            vec![
                "Customer: Do you ship to Canada?",
                "Support Agent: Yes, in 7-10 business days.",
            ]
        );
    }

    #[test]
    fn transcript_keeps_only_last_five() {
        let builder = PromptBuilder::default();
        let history: Vec<Message> = (0..10)
            .map(|i| turn(Sender::User, &format!("turn {i}")))
            .collect();
        let prompt = builder.build(&history, "latest");

        let lines = transcript_lines(&prompt);
        assert_eq!(lines.len(), TRANSCRIPT_WINDOW);
        assert_eq!(lines[0], "Customer: turn 5");
        assert_eq!(lines[4], "Customer: turn 9");
        assert!(!prompt.contains("turn 4\n"));
    }

    #[test]
    fn long_question_is_truncated_with_ellipsis() {
        let builder = PromptBuilder::new("K");
        let question = "é".repeat(MAX_QUESTION_CHARS + 50);
        let prompt = builder.build(&[], &question);

        let expected = format!("{}...", "é".repeat(MAX_QUESTION_CHARS));
        assert!(prompt.ends_with(&expected));
        assert!(!prompt.contains(&"é".repeat(MAX_QUESTION_CHARS + 1)));
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly", 7), "exactly");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }
}
