//! Property tests: reply parsing and single-answer matching.

use proptest::prelude::*;

use lapse_core::config::RequestConfig;
use lapse_core::{Janitor, ManualClock};
use lapse_respond::{
    Interception, KeywordParser, ParsedResponse, Reply, ResponseParser, ResponseRegistry,
};

const WORDS: [(&str, Reply); 6] = [
    ("yes", Reply::Yes),
    ("y", Reply::Yes),
    ("no", Reply::No),
    ("accept", Reply::Accept),
    ("deny", Reply::Deny),
    ("decline", Reply::Deny),
];

fn shout(word: &str, mask: &[bool]) -> String {
    word.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect()
}

proptest! {
    #[test]
    fn keyword_parses_regardless_of_case_slash_and_spacing(
        pick in 0..WORDS.len(),
        mask in prop::collection::vec(any::<bool>(), 1..8),
        slash in any::<bool>(),
        pad in 0usize..4,
        context in prop::collection::vec("[a-z]{1,8}", 0..3),
    ) {
        let (word, kind) = WORDS[pick];
        let mut message = format!("{}{}{}", " ".repeat(pad), if slash { "/" } else { "" }, shout(word, &mask));
        for part in &context {
            message.push_str(&" ".repeat(pad + 1));
            message.push_str(part);
        }

        let parsed = KeywordParser::replies().parse(&message);
        let expected = if context.is_empty() {
            ParsedResponse::bare(kind)
        } else {
            ParsedResponse::to(kind, context.join(" "))
        };
        prop_assert_eq!(parsed, Some(expected));
    }

    #[test]
    fn a_request_is_answered_at_most_once(replies in prop::collection::vec(0..WORDS.len(), 1..10)) {
        let janitor = Janitor::new(ManualClock::new());
        let sink = |_: &u8, _: &str| true;
        let registry = ResponseRegistry::<u8, Reply>::new(
            &janitor,
            KeywordParser::replies(),
            sink,
            &RequestConfig::default(),
        ).expect("default config");
        let request = registry
            .request(1, "vote", [Reply::Yes, Reply::No, Reply::Accept, Reply::Deny])
            .expect("submit");

        let handled = replies
            .iter()
            .map(|&i| registry.handle_message(&1, WORDS[i].0))
            .filter(Interception::is_intercepted)
            .count();

        prop_assert_eq!(handled, 1);
        prop_assert_eq!(request.response(), Some(WORDS[replies[0]].1));
        prop_assert_eq!(registry.stats().responded, 1);
    }
}
