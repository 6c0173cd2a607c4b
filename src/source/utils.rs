/// Trim whitespace and a leading byte-order mark from a header name.
pub fn clean_header(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}

/// Separators considered when sniffing.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

fn sample_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect()
}

fn counts(lines: &[&str], delim: u8) -> Vec<usize> {
    lines
        .iter()
        .map(|l| l.bytes().filter(|&b| b == delim).count())
        .collect()
}

/// The candidate that appears the same, non-zero number of times on every
/// sampled line, preferring the most frequent.
pub fn consistent_delimiter(content: &str) -> Option<u8> {
    let lines = sample_lines(content);
    let mut best: Option<(u8, usize)> = None;
    for &delim in &DELIMITER_CANDIDATES {
        let counts = counts(&lines, delim);
        let Some(&first) = counts.first() else {
            return None;
        };
        if first > 0
            && counts.iter().all(|&c| c == first)
            && best.map_or(true, |(_, n)| first > n)
        {
            best = Some((delim, first));
        }
    }
    best.map(|(d, _)| d)
}

/// Guess the field separator from the first non-empty lines of `content`.
///
/// A consistent candidate wins (see `consistent_delimiter`). Falls back to the
/// one with the highest total, then to comma.
pub fn detect_delimiter(content: &str) -> u8 {
    if let Some(d) = consistent_delimiter(content) {
        return d;
    }
    let lines = sample_lines(content);
    let mut best_total: Option<(u8, usize)> = None;
    for &delim in &DELIMITER_CANDIDATES {
        let total: usize = counts(&lines, delim).iter().sum();
        if total > 0 && best_total.map_or(true, |(_, n)| total > n) {
            best_total = Some((delim, total));
        }
    }
    best_total.map(|(d, _)| d).unwrap_or(b',')
}

/// 1-based line on which a quoted field opens and never closes, if any.
///
/// Uses the reader's quoting rules: a quote opens a field only at its start,
/// and `""` inside a quoted field is a literal quote.
pub fn unterminated_quote(content: &str, delimiter: u8) -> Option<usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        QuoteInQuoted,
    }

    let mut state = State::FieldStart;
    let mut line = 1;
    let mut opened = 0;
    for b in content.bytes() {
        state = match (state, b) {
            (State::Quoted, b'"') => State::QuoteInQuoted,
            (State::Quoted, _) => State::Quoted,
            (State::QuoteInQuoted, b'"') => State::Quoted,
            (State::FieldStart, b'"') => {
                opened = line;
                State::Quoted
            }
            (_, b'\n' | b'\r') => State::FieldStart,
            (_, c) if c == delimiter => State::FieldStart,
            _ => State::Unquoted,
        };
        if b == b'\n' {
            line += 1;
        }
    }
    (state == State::Quoted).then_some(opened)
}
