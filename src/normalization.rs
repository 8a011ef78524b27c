use serde::{Deserialize, Deserializer};

/// Normalizes free text by stripping surrounding whitespace and
/// decomposing it into Unicode Normalization Form D, so that visually
/// identical names compare equal.
///
/// ```
/// use tracker::normalization::normalize_name;
/// assert_eq!(normalize_name(" hï "), "hï");
/// ```
pub fn normalize_name(name: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    name.as_ref().trim().nfd().to_string()
}

/// Deserializes a `String` after running it through `normalize_name`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let s = String::deserialize(deserializer)?;
    Ok(normalize_name(s))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use unicode_normalization::is_nfd;

    use super::normalize_name;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 2000, ..ProptestConfig::default()
        })]

        #[test]
        fn names_are_trimmed_and_decomposed(string in "(\\S.*\\S|\\S+)", space_before in "\\s*", space_after in "\\s*") {
            let normalized = normalize_name(format!("{}{}{}", space_before, string, space_after));

            prop_assert!(is_nfd(&normalized), "{:?} (normalized form of {:?}) is in NFD", normalized, string);

            prop_assert!(!normalized.starts_with(char::is_whitespace) && !normalized.ends_with(char::is_whitespace), "{:?} (normalized form of {:?}) has no leading or trailing whitespace", normalized, string);

            prop_assert_eq!(normalize_name(&normalized), normalized.clone(), "normalizing {:?} twice changes nothing", string);
        }
    }
}
