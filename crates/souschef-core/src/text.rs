//! Term normalisation shared by the hashing embedder and the offline model.

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "its", "me", "of", "on", "or", "that", "the", "this", "to", "was",
    "what", "when", "where", "which", "who", "why", "with", "you",
];

pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.binary_search(&term).is_ok()
}

/// Lowercased alphanumeric terms of `text`, stop words removed.
///
/// Apostrophes inside a word are dropped ("cook's" -> "cooks"); every other
/// non-alphanumeric character separates terms. `_` separates too, so tool
/// names like `Food_Dictionary` yield `food` and `dictionary`.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|raw| raw.chars().filter(|c| *c != '\'').flat_map(char::to_lowercase).collect::<String>())
        .filter(|t| !t.is_empty() && !is_stop_word(t))
        .collect()
}
