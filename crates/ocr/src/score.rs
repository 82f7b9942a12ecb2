/// Words that commonly appear on bills and receipts. Each distinct match
/// adds a flat bonus to the score.
pub const KEYWORDS: [&str; 8] = [
    "total", "amount", "tax", "service", "bill", "receipt", "date", "time",
];

const DIGIT_WEIGHT: usize = 2;
const KEYWORD_WEIGHT: usize = 10;

/// Heuristic estimate of text-extraction quality, used only to rank one
/// configuration's output against another's:
///
///   trimmed length + 2·(digit count) + 10·(distinct keywords present)
///
/// Digits are counted over the whole text; keywords match
/// case-insensitively as substrings and count once each.
pub fn score_text(text: &str) -> usize {
    let length = text.trim().chars().count();
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    let lowered = text.to_lowercase();
    let keywords = KEYWORDS.iter().filter(|kw| lowered.contains(*kw)).count();

    length + DIGIT_WEIGHT * digits + KEYWORD_WEIGHT * keywords
}
