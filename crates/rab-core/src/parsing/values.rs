use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]+").expect("valid number pattern"));

/// Dot-grouped thousands without any decimal part, e.g. "100.000" or "1.250.000".
static DOT_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]\d{0,2}(\.\d{3})+$").expect("valid grouping pattern"));

/// Result of reading a number out of a document token.
///
/// Callers that only need the value use [`NumberParse::value`], which maps
/// `Defaulted` to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberParse {
    Parsed(Decimal),
    /// Nothing numeric could be read from the token.
    Defaulted,
}

impl NumberParse {
    pub fn value(self) -> Decimal {
        match self {
            NumberParse::Parsed(v) => v,
            NumberParse::Defaulted => Decimal::ZERO,
        }
    }

    pub fn is_defaulted(self) -> bool {
        matches!(self, NumberParse::Defaulted)
    }
}

/// Parse a number written with either Indonesian ("1.234,56") or English
/// ("1,234.56") punctuation.
///
/// Handles formats like:
/// - "1.234,56" -> 1234.56 (comma after the last dot is the decimal point)
/// - "2,5" -> 2.5 (a comma with no dot is a decimal comma)
/// - "1,234.56" -> 1234.56 (commas are thousands separators)
/// - "100.000" -> 100000 (dots delimiting three-digit groups)
/// - "10.5" -> 10.5
/// - "Rp 25.000" -> 25000 (first run of digits and dots)
pub fn parse_number(token: &str) -> NumberParse {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return NumberParse::Defaulted;
    }

    // Only comma-free tokens can use dots as thousands separators on their own.
    let (canonical, dots_may_group) = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            (compact.replace('.', "").replace(',', "."), false)
        }
        (Some(_), None) => (compact.replace(',', "."), false),
        (Some(_), Some(_)) => (compact.replace(',', ""), false),
        (None, _) => (compact, true),
    };

    let Some(run) = NUMBER_RUN.find(&canonical) else {
        return NumberParse::Defaulted;
    };
    let run = run.as_str().trim_matches('.');
    if run.is_empty() {
        return NumberParse::Defaulted;
    }

    let digits = if dots_may_group && DOT_GROUPED.is_match(run) {
        run.replace('.', "")
    } else {
        run.to_string()
    };

    match Decimal::from_str(&digits) {
        Ok(v) => NumberParse::Parsed(v),
        Err(_) => NumberParse::Defaulted,
    }
}

/// Whether a comma-free token reads as dot-grouped thousands ("100.000").
pub fn is_dot_grouped(token: &str) -> bool {
    DOT_GROUPED.is_match(token.trim())
}

/// Numeric value of a token, degrading to zero for empty or unreadable input.
pub fn clean_number(token: Option<&str>) -> Decimal {
    token.map(parse_number).unwrap_or(NumberParse::Defaulted).value()
}

/// Decide whether a token is a number rather than text.
///
/// A token qualifies when it carries at least one digit and its digits
/// outnumber its letters, so unit labels next to numbers ("M2", "Ls 2") stay
/// textual.
pub fn is_numeric_token(token: Option<&str>) -> bool {
    let Some(token) = token else {
        return false;
    };
    let stripped: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != ',')
        .collect();
    if stripped.is_empty() {
        return false;
    }

    let digits = stripped.chars().filter(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    let letters = stripped.chars().filter(|c| c.is_alphabetic()).count();
    letters == 0 || letters < digits
}
