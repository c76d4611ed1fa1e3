//! Wake-phrase gate: decides whether an utterance is addressed to the bot.

/// Characters dropped between the wake phrase and the question
/// ("Okay assistant, what is X" -> "what is X").
const SEPARATORS: &[char] = &[',', '.', ':', ';', '!', '?', '-'];

/// Prefix matcher over an ordered list of wake phrase variants.
#[derive(Debug, Clone)]
pub struct WakeWordGate {
    /// Lowercased, trimmed, in priority order.
    phrases: Vec<String>,
}

impl WakeWordGate {
    /// Build a gate; blank variants are ignored, order is kept.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Check an utterance against the wake phrases.
    ///
    /// Returns `(true, Some(question))` for the first variant that prefixes the
    /// utterance, ignoring case and surrounding whitespace. The question keeps
    /// the speaker's casing and may be empty when only the phrase was said.
    /// Returns `(false, None)` when nothing matches.
    pub fn check(&self, text: &str) -> (bool, Option<String>) {
        match self.strip(text) {
            Some(question) => (true, Some(question)),
            None => (false, None),
        }
    }

    /// The question after the wake phrase, if the utterance is addressed to the bot.
    pub fn strip(&self, text: &str) -> Option<String> {
        let text = text.trim();
        self.phrases.iter().find_map(|phrase| {
            prefix_len(text, phrase).map(|end| {
                text[end..]
                    .trim_start_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
                    .trim_end()
                    .to_string()
            })
        })
    }
}

/// Byte length of the part of `text` that matches the lowercase `phrase`.
///
/// Case-insensitive; a space in the phrase matches any run of whitespace.
fn prefix_len(text: &str, phrase: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    let mut phrase_chars = phrase.chars().peekable();

    while let Some(p) = phrase_chars.next() {
        if p.is_whitespace() {
            while phrase_chars.next_if(|c| c.is_whitespace()).is_some() {}
            let mut seen = false;
            while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {
                seen = true;
            }
            if !seen {
                return None;
            }
            continue;
        }

        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }

    Some(chars.peek().map_or(text.len(), |(i, _)| *i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> WakeWordGate {
        WakeWordGate::new(["okay assistant", "ok assistant"])
    }

    #[test]
    fn test_uppercase_variant_matches() {
        assert_eq!(
            gate().check("OK ASSISTANT what is X"),
            (true, Some("what is X".to_string()))
        );
    }

    #[test]
    fn test_unaddressed_utterance() {
        assert_eq!(gate().check("hello there"), (false, None));
    }

    #[test]
    fn test_exact_phrase_has_empty_question() {
        assert_eq!(gate().check("Okay Assistant"), (true, Some(String::new())));
        assert_eq!(gate().check("  okay assistant.  "), (true, Some(String::new())));
    }

    #[test]
    fn test_phrase_must_be_a_prefix() {
        assert_eq!(gate().check("so okay assistant what is X"), (false, None));
    }

    #[test]
    fn test_priority_order() {
        let gate = WakeWordGate::new(["ok", "ok assistant"]);
        // "ok" is listed first, so it wins even though the longer variant also matches.
        assert_eq!(gate.strip("ok assistant hi").as_deref(), Some("assistant hi"));

        let gate = WakeWordGate::new(["ok assistant", "ok"]);
        assert_eq!(gate.strip("ok assistant hi").as_deref(), Some("hi"));
    }

    #[test]
    fn test_separator_and_whitespace_tolerance() {
        assert_eq!(
            gate().strip("Okay assistant, what's the plan?").as_deref(),
            Some("what's the plan?")
        );
        assert_eq!(
            gate().strip("okay   assistant\twhat is X").as_deref(),
            Some("what is X")
        );
    }

    #[test]
    fn test_blank_phrases_are_ignored() {
        let gate = WakeWordGate::new(["", "   ", " Hey Parley "]);
        assert_eq!(gate.phrases(), &["hey parley".to_string()]);
        assert_eq!(gate.strip("hey parley status").as_deref(), Some("status"));
        assert_eq!(WakeWordGate::new(Vec::<String>::new()).strip("anything"), None);
    }

    #[test]
    fn test_non_ascii_case_folding() {
        let gate = WakeWordGate::new(["ÉCOUTE"]);
        assert_eq!(gate.strip("écoute quelle heure").as_deref(), Some("quelle heure"));
    }

    #[test]
    fn test_text_shorter_than_phrase() {
        assert_eq!(gate().strip("okay"), None);
        assert_eq!(gate().strip(""), None);
    }
}
