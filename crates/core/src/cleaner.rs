use crate::error::IngestError;
use regex::Regex;

const PAGE_FOOTER_PATTERN: &str = r"(?i)page\s+[0-9]+(?:\s+of\s+[0-9]+)?";
const BOILERPLATE_PATTERN: &str = r"(?i)confidential|draft\s+copy|do\s+not\s+distribute";

/// Normalizes text extracted from a PDF page before it is embedded.
///
/// Control characters and zero-width characters are dropped, whitespace runs
/// collapse to one space, and page footers plus boilerplate markers are
/// removed. The removal steps repeat until the text is stable, so cleaning
/// already-clean text returns it unchanged.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    page_footer: Regex,
    boilerplate: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            page_footer: Regex::new(PAGE_FOOTER_PATTERN)?,
            boilerplate: Regex::new(BOILERPLATE_PATTERN)?,
        })
    }

    pub fn clean(&self, raw: &str) -> String {
        let visible = raw
            .chars()
            .filter(|character| !is_stripped_character(*character))
            .collect::<String>();

        let mut current = normalize_whitespace(&visible);
        loop {
            let without_footers = self.page_footer.replace_all(&current, "");
            let without_boilerplate = self.boilerplate.replace_all(&without_footers, "");
            let next = normalize_whitespace(&without_boilerplate);

            if next == current {
                return next;
            }
            current = next;
        }
    }
}

/// ASCII control characters (which includes `\n` and `\t`) plus the
/// zero-width and byte-order-mark range.
fn is_stripped_character(character: char) -> bool {
    matches!(
        character,
        '\u{0000}'..='\u{001f}' | '\u{007f}' | '\u{200b}'..='\u{200f}' | '\u{feff}'
    )
}

/// Collapses whitespace runs into single spaces and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new().expect("static patterns compile")
    }

    const SAMPLES: [&str; 10] = [
        "",
        "   ",
        "Hospital infection control\tprogram   Page 4 of 12",
        "CONFIDENTIAL  Draft   Copy patient rights and education",
        "PaPage 1ge 2 leftover",
        "ConConfidentialfidential",
        "Page Page 3 4 tail",
        "zero\u{200b}width\u{feff} text\u{7f} with\u{0} controls",
        "Do\u{a0}Not  Distribute  -- access, assessment and continuity of care",
        "multi\nline\r\ntext   with  page 9",
    ];

    #[test]
    fn removes_footers_and_boilerplate() {
        let cleaned = cleaner().clean("Confidential Standard 1.2 Page 3 of 40 covers consent. Do Not Distribute");
        assert_eq!(cleaned, "Standard 1.2 covers consent.");
    }

    #[test]
    fn control_characters_are_removed_not_replaced() {
        let cleaned = cleaner().clean("first\nsecond\tthird");
        assert_eq!(cleaned, "firstsecondthird");
    }

    #[test]
    fn invisible_unicode_is_removed() {
        let cleaned = cleaner().clean("medi\u{200b}cation\u{feff} safety");
        assert_eq!(cleaned, "medication safety");
    }

    #[test]
    fn unicode_whitespace_collapses_to_single_space() {
        let cleaned = cleaner().clean("quality\u{a0}\u{a0} improvement\u{3000}plan");
        assert_eq!(cleaned, "quality improvement plan");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(cleaner().clean(""), "");
        assert_eq!(cleaner().clean(" Page 2 "), "");
    }

    #[test]
    fn matches_exposed_by_removal_are_removed_too() {
        let cleaner = cleaner();
        assert_eq!(cleaner.clean("ConConfidentialfidential"), "");
        assert_eq!(cleaner.clean("Page Page 3 4 tail"), "tail");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let cleaner = cleaner();
        for sample in SAMPLES {
            let once = cleaner.clean(sample);
            assert_eq!(cleaner.clean(&once), once, "sample: {sample:?}");
        }
    }

    #[test]
    fn cleaning_never_increases_length() {
        let cleaner = cleaner();
        for sample in SAMPLES {
            let cleaned = cleaner.clean(sample);
            assert!(cleaned.chars().count() <= sample.chars().count(), "sample: {sample:?}");
            assert!(cleaned.len() <= sample.len(), "sample: {sample:?}");
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot of spacing");
    }
}
