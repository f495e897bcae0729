//! Utility functions and helpers.

pub mod http;

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
pub fn last_path_segment(url_str: &str) -> Option<String> {
    let parsed = Url::parse(url_str).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").expect("valid price pattern")
    })
}

/// Parse a displayed price such as `"$6,554.05"` or `"Now $1,299"`.
///
/// Takes the first number in the text; thousands separators are dropped.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let found = price_pattern().find(text)?;
    let digits = found.as_str().replace(',', "");
    Decimal::from_str(&digits).ok()
}

/// Format a price for display: two decimals with thousands separators.
pub fn format_price(price: Decimal) -> String {
    let rounded = price
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{frac_part}")
}
