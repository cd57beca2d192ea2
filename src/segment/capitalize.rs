//! Title-casing for company names returned by the model.

/// Capitalize each word (first letter upper, rest lower). A leading "the" in any
/// casing becomes "The". Whitespace runs collapse to single spaces.
pub fn capitalize_company_name(name: &str) -> String {
    name.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 && word.eq_ignore_ascii_case("the") {
                "The".to_string()
            } else {
                capitalize_word(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Multi-char uppercase expansions ("ß" -> "SS") keep only their first letter
// upper so a second pass is a no-op.
fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut upper = first.to_uppercase();
    let mut out = String::with_capacity(word.len());
    out.extend(upper.next());
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars.flat_map(char::to_lowercase));
    out
}
