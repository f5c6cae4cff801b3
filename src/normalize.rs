use unicode_normalization::UnicodeNormalization;

/// Fold accents and case so names compare the way users type them.
///
/// NFKD splits accented letters into base letter plus combining mark; everything
/// left outside ASCII is dropped.
pub fn normalize(text: &str) -> String {
    text.nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase()
}
