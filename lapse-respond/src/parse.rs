//! Turning a raw message into a response kind and an optional context name.
//!
//! ```text
//!   "/accept trade with Bob"
//!    ╰─┬──╯ ╰──────┬───────╯
//!     kind    context name
//! ```

use std::collections::HashMap;
use std::fmt;

/// A message recognised as a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse<K> {
    /// What kind of answer this is.
    pub kind: K,
    /// Names the request being answered, when the sender picked one.
    pub context: Option<String>,
}

impl<K> ParsedResponse<K> {
    /// A response that names no particular request.
    pub fn bare(kind: K) -> Self {
        Self { kind, context: None }
    }

    /// A response aimed at the request named `context`.
    pub fn to(kind: K, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: Some(context.into()),
        }
    }
}

/// Classifies incoming messages.
///
/// Returning `None` means "not a response"; the message is left for the
/// host's normal handling.
pub trait ResponseParser<K>: Send + Sync {
    /// Classify `message`.
    fn parse(&self, message: &str) -> Option<ParsedResponse<K>>;
}

impl<K, F> ResponseParser<K> for F
where
    F: Fn(&str) -> Option<ParsedResponse<K>> + Send + Sync,
{
    fn parse(&self, message: &str) -> Option<ParsedResponse<K>> {
        self(message)
    }
}

/// Stock reply kinds understood by [`KeywordParser::replies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    /// Agreement.
    Yes,
    /// Refusal.
    No,
    /// Accepting an offer or invitation.
    Accept,
    /// Turning an offer or invitation down.
    Deny,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Accept => "accept",
            Self::Deny => "deny",
        };
        f.write_str(word)
    }
}

/// Maps a leading keyword to a response kind.
///
/// A leading `/` is ignored, the keyword is matched case-insensitively, and
/// any words after it form the context name.
#[derive(Debug, Clone)]
pub struct KeywordParser<K> {
    words: HashMap<String, K>,
}

impl<K: Clone> KeywordParser<K> {
    /// A parser that recognises nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: HashMap::new(),
        }
    }

    /// Recognise `word` as `kind`.
    #[must_use]
    pub fn keyword(mut self, word: &str, kind: K) -> Self {
        self.words.insert(word.to_lowercase(), kind);
        self
    }

    /// Recognise every word in `words` as `kind`.
    #[must_use]
    pub fn aliases(self, words: &[&str], kind: &K) -> Self {
        words
            .iter()
            .fold(self, |parser, word| parser.keyword(word, kind.clone()))
    }

    /// Number of recognised words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no word is recognised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl KeywordParser<Reply> {
    /// The usual chat replies with their short forms.
    #[must_use]
    pub fn replies() -> Self {
        Self::new()
            .aliases(&["yes", "y", "yeah", "ok"], &Reply::Yes)
            .aliases(&["no", "n", "nope"], &Reply::No)
            .aliases(&["accept", "a"], &Reply::Accept)
            .aliases(&["deny", "decline", "d"], &Reply::Deny)
    }
}

impl<K: Clone> Default for KeywordParser<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ResponseParser<K> for KeywordParser<K>
where
    K: Clone + Send + Sync,
{
    fn parse(&self, message: &str) -> Option<ParsedResponse<K>> {
        let message = message.trim();
        let message = message.strip_prefix('/').unwrap_or(message);
        let mut words = message.split_whitespace();
        let kind = self.words.get(&words.next()?.to_lowercase())?.clone();
        let context = words.collect::<Vec<_>>().join(" ");
        if context.is_empty() {
            Some(ParsedResponse::bare(kind))
        } else {
            Some(ParsedResponse::to(kind, context))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_and_case_are_ignored() {
        let parser = KeywordParser::replies();
        assert_eq!(parser.parse("/YES"), Some(ParsedResponse::bare(Reply::Yes)));
        assert_eq!(parser.parse("  y "), Some(ParsedResponse::bare(Reply::Yes)));
        assert_eq!(parser.parse("Decline"), Some(ParsedResponse::bare(Reply::Deny)));
    }

    #[test]
    fn trailing_words_become_the_context() {
        let parser = KeywordParser::replies();
        assert_eq!(
            parser.parse("/accept  trade   offer"),
            Some(ParsedResponse::to(Reply::Accept, "trade offer"))
        );
    }

    #[test]
    fn unknown_or_empty_messages_are_not_responses() {
        let parser = KeywordParser::replies();
        assert_eq!(parser.parse("hello there"), None);
        assert_eq!(parser.parse("/"), None);
        assert_eq!(parser.parse(""), None);
    }

    #[test]
    fn closures_are_parsers() {
        let parser = |msg: &str| (msg == "!").then(|| ParsedResponse::bare(1_u8));
        assert_eq!(parser.parse("!"), Some(ParsedResponse::bare(1)));
        assert_eq!(parser.parse("?"), None);
    }

    #[test]
    fn custom_keywords() {
        let parser = KeywordParser::new().keyword("Join", "join").keyword("leave", "leave");
        assert_eq!(parser.len(), 2);
        assert_eq!(parser.parse("join red"), Some(ParsedResponse::to("join", "red")));
    }
}
