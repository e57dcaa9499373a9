//! Text normalization applied to category, action, label and timing fields before they reach a
//! sink.

use serde_json::Value;

use crate::analytics::constants::REDACTED_EMAIL;

const SMALL_WORDS: [&str; 23] = [
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "nor", "of", "on", "or",
    "per", "the", "to", "v", "vs", "v.", "vs.", "via",
];

/// Normalizes user-facing text: potential email addresses are redacted, everything else is
/// title-cased when `title_case` is enabled.
pub fn format_text(value: &str, title_case: bool) -> String {
    if might_be_email(value) {
        log::warn!("This arg looks like an email address, redacting.");
        return REDACTED_EMAIL.to_string();
    }

    if title_case {
        to_title_case(value)
    } else {
        value.to_string()
    }
}

/// Returns `true` when the text contains an `@` surrounded by other characters.
pub fn might_be_email(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    chars.iter().enumerate().any(|(index, c)| {
        *c == '@'
            && index > 0
            && chars[index - 1] != '@'
            && chars.get(index + 1).is_some_and(|next| *next != '@')
    })
}

pub fn remove_leading_slash(value: &str) -> &str {
    value.strip_prefix('/').unwrap_or(value)
}

pub fn remove_trailing_slash(value: &str) -> &str {
    value.strip_suffix('/').unwrap_or(value)
}

/// Title-cases the trimmed text. Small words (articles, short conjunctions and prepositions) stay
/// lower-case unless they open or close the title, and words that already carry an inner capital
/// or a dotted part (`iPhone`, `example.com`) are left untouched.
pub fn to_title_case(value: &str) -> String {
    let title: Vec<char> = value.trim().chars().collect();
    let len = title.len();
    let mut output = String::with_capacity(value.len());
    let mut index = 0;

    while index < len {
        if !is_word_start(title[index]) {
            output.push(title[index]);
            index += 1;
            continue;
        }

        let end = title[index..]
            .iter()
            .position(|c| c.is_whitespace() || *c == '-')
            .map_or(len, |offset| index + offset);
        output.push_str(&title_case_word(&title, index, end));
        index = end;
    }

    output
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('\u{C0}'..='\u{FF}').contains(&c)
}

fn title_case_word(title: &[char], index: usize, end: usize) -> String {
    let word: String = title[index..end].iter().collect();
    let char_at = |position: Option<usize>| position.and_then(|p| title.get(p)).copied();
    let before = char_at(index.checked_sub(1));

    let is_small = SMALL_WORDS
        .iter()
        .any(|small| small.eq_ignore_ascii_case(&word));
    if index > 0
        && end != title.len()
        && is_small
        && char_at(index.checked_sub(2)) != Some(':')
        && (char_at(Some(end)) != Some('-') || before == Some('-'))
        && before.map_or(true, |c| c.is_whitespace() || c == '-')
    {
        return word.to_lowercase();
    }

    let rest: Vec<char> = word.chars().skip(1).collect();
    if rest.iter().any(char::is_ascii_uppercase)
        || rest.windows(2).any(|pair| pair[0] == '.' && pair[1] != '\n')
    {
        return word;
    }

    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => word,
    }
}

/// Truthiness as the host state layer defines it: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a truthy value as text; falsy or missing values yield `None`.
pub fn truthy_text(value: Option<&Value>) -> Option<String> {
    let value = value.filter(|value| is_truthy(value))?;
    match value {
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn title_cases_plain_words() {
        assert_eq!(to_title_case("foo bar"), "Foo Bar");
        assert_eq!(to_title_case("  padded value "), "Padded Value");
    }

    #[test]
    fn small_words_stay_lower_case_inside_titles() {
        assert_eq!(to_title_case("the lord of the rings"), "The Lord of the Rings");
        assert_eq!(to_title_case("go to"), "Go To");
    }

    #[test]
    fn hyphenated_words_are_capitalized_per_part() {
        assert_eq!(to_title_case("e-mail sign-up"), "E-Mail Sign-Up");
    }

    #[test]
    fn words_with_inner_capitals_or_dots_are_kept() {
        assert_eq!(to_title_case("stateChange"), "stateChange");
        assert_eq!(to_title_case("visit example.com"), "Visit example.com");
    }

    #[test]
    fn email_addresses_are_redacted() {
        assert!(might_be_email("someone@example.com"));
        assert!(!might_be_email("@handle"));
        assert_eq!(format_text("someone@example.com", true), REDACTED_EMAIL);
        assert_eq!(format_text("someone@example.com", false), REDACTED_EMAIL);
    }

    #[test]
    fn format_without_title_case_keeps_text() {
        assert_eq!(format_text("lower case", false), "lower case");
    }

    #[test]
    fn slash_helpers_strip_one_slash() {
        assert_eq!(remove_leading_slash("//foo"), "/foo");
        assert_eq!(remove_trailing_slash("foo/"), "foo");
        assert_eq!(remove_leading_slash("foo"), "foo");
    }

    #[test]
    fn truthiness_matches_state_semantics() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([])));
        assert_eq!(truthy_text(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(truthy_text(Some(&json!(""))), None);
        assert_eq!(truthy_text(None), None);
    }
}
