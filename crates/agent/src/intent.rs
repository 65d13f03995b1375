//! Deterministic reading of user turns.
//!
//! Routing never depends on language-model output: names, IDs, greetings
//! and exit requests are recognised here with plain string rules.

/// Lead-ins stripped before a name or ID lookup, longest first.
const LEAD_INS: &[&str] = &[
    "my patient id is",
    "my name is",
    "patient id:",
    "patient id",
    "my id is",
    "the name is",
    "this is",
    "it's",
    "it is",
    "i'm",
    "i am",
    "name:",
    "id:",
];

/// Longest first, so "hi there" wins over "hi".
const GREETINGS: &[&str] = &[
    "good afternoon",
    "good morning",
    "good evening",
    "hello there",
    "hi there",
    "hello",
    "hey",
    "hi",
];

/// Longest first, so "thank you" is removed before "thanks".
const FAREWELLS: &[&str] = &[
    "no more questions",
    "that's all",
    "thats all",
    "thank you",
    "goodbye",
    "thanks",
    "bye",
];

/// Words that may pad a farewell without turning it into a request.
const FAREWELL_FILLER: &[&str] = &[
    "ok", "okay", "so", "much", "very", "again", "for", "everything", "all", "your", "the",
    "help", "great", "and", "now", "then", "today", "that", "is", "it",
];

/// Normalise for comparisons: lowercase, trimmed, trailing punctuation off.
fn normalise(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase()
}

/// Strip greetings and lead-ins such as "my name is"; the remainder is the
/// candidate. With no lead-in the turn content is used verbatim.
pub fn extract_candidate(text: &str) -> String {
    let mut rest = text.trim();

    // "Hi, I'm John Smith" -> "I'm John Smith"
    for greeting in GREETINGS {
        if let Some(after) = strip_prefix_ci(rest, greeting) {
            if after.starts_with([',', '!', '.']) || after.starts_with(' ') {
                rest = after.trim_start_matches([',', '!', '.', ' ']);
                break;
            }
        }
    }

    for lead in LEAD_INS {
        if let Some(after) = strip_prefix_ci(rest, lead) {
            rest = after.trim_start_matches([':', ',', ' ']);
            break;
        }
    }

    rest.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// A single token containing a digit, e.g. "P001". Names never qualify.
pub fn looks_like_patient_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.contains(char::is_whitespace)
        && candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

pub fn is_greeting(text: &str) -> bool {
    let t = normalise(text);
    GREETINGS.contains(&t.as_str())
}

/// The whole turn is a sign-off ("Thanks, bye!"). A farewell phrase
/// followed by a question or any other request is not.
pub fn is_farewell(text: &str) -> bool {
    if text.contains('?') {
        return false;
    }

    let mut rest = format!(" {} ", words(text));
    let mut found = false;
    for phrase in FAREWELLS {
        let needle = format!(" {phrase} ");
        while let Some(pos) = rest.find(&needle) {
            rest.replace_range(pos..pos + needle.len() - 1, "");
            found = true;
        }
    }

    found && rest.split_whitespace().all(|w| FAREWELL_FILLER.contains(&w))
}

/// Case-insensitive whole-word containment of any phrase.
pub fn contains_phrase<S: AsRef<str>>(text: &str, phrases: &[S]) -> bool {
    let haystack = format!(" {} ", words(text));
    phrases.iter().any(|p| {
        let needle = words(p.as_ref());
        !needle.is_empty() && haystack.contains(&format!(" {needle} "))
    })
}

/// Lowercase words separated by single spaces; apostrophes and hyphens kept.
fn words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
