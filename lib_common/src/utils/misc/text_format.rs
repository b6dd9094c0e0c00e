//! Number formatting for human-facing log lines and reports.

/// Renders `n` as an English ordinal: `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`.
///
/// Zero and negative numbers are returned without a suffix.
pub fn int_to_ordinal(n: i64) -> String {
    if n <= 0 {
        return n.to_string();
    }

    let suffix = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Renders `n` with `,` between groups of three digits, e.g. `1,234,567`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
