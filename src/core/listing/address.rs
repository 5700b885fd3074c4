//! Address normalization used for ingest dedupe and listing ids.

const SUFFIXES: [(&str, &str); 9] = [
    ("st", "street"),
    ("dr", "drive"),
    ("ave", "avenue"),
    ("rd", "road"),
    ("ln", "lane"),
    ("ct", "court"),
    ("cir", "circle"),
    ("blvd", "boulevard"),
    ("pl", "place"),
];

/// Lowercase, strip punctuation, collapse whitespace and expand common
/// street-suffix abbreviations. Two addresses naming the same property
/// normalize to the same string.
///
/// A leading token is never expanded, so "St Louis Ave" keeps its "st".
pub fn normalize_address(address: &str) -> String {
    let cleaned: String = address
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .enumerate()
        .map(|(idx, token)| {
            if idx == 0 {
                return token;
            }
            SUFFIXES
                .iter()
                .find(|(abbr, _)| *abbr == token)
                .map_or(token, |(_, full)| full)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable listing id derived from the normalized address.
pub fn listing_id_for(address: &str) -> Option<String> {
    let normalized = normalize_address(address);
    if normalized.is_empty() {
        return None;
    }
    let mut slug = normalized.replace(' ', "-");
    if slug.len() > 64 {
        let mut cut = 64;
        while !slug.is_char_boundary(cut) {
            cut -= 1;
        }
        slug.truncate(cut);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    Some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_and_punctuation_collapse() {
        assert_eq!(
            normalize_address("12 Oak St., Portland"),
            normalize_address("12 oak street portland")
        );
        assert_eq!(normalize_address("  9  Elm   Ave "), "9 elm avenue");
    }

    #[test]
    fn suffix_inside_word_is_untouched() {
        assert_eq!(normalize_address("4 Stone Ct"), "4 stone court");
        assert_eq!(normalize_address("St Louis Pl"), "st louis place");
    }

    #[test]
    fn slug_ids_are_stable() {
        assert_eq!(
            listing_id_for("12 Oak St, Portland OR").as_deref(),
            Some("12-oak-street-portland-or")
        );
        assert_eq!(listing_id_for("  ,, "), None);
    }

    #[test]
    fn long_slug_is_trimmed() {
        let address = format!("1 {} Rd", "very long name ".repeat(10));
        let slug = listing_id_for(&address).unwrap();
        assert!(slug.len() <= 64);
        assert!(!slug.ends_with('-'));
    }
}
