//! Text normalization and counting helpers shared by the detectors.

/// Cyrillic characters that render like Latin letters, mapped to their
/// lookalikes. Substituting these is a common way to dodge literal keyword
/// scans, so patterns are matched against both the raw text and the folded
/// variant.
const CYRILLIC_FOLD: &[(char, char)] = &[
    ('а', 'a'),
    ('А', 'A'),
    ('в', 'b'),
    ('В', 'B'),
    ('с', 'c'),
    ('С', 'C'),
    ('е', 'e'),
    ('Е', 'E'),
    ('н', 'h'),
    ('Н', 'H'),
    ('і', 'i'),
    ('І', 'I'),
    ('к', 'k'),
    ('К', 'K'),
    ('м', 'm'),
    ('М', 'M'),
    ('о', 'o'),
    ('О', 'O'),
    ('р', 'p'),
    ('Р', 'P'),
    ('т', 't'),
    ('Т', 'T'),
    ('у', 'y'),
    ('У', 'Y'),
    ('х', 'x'),
    ('Х', 'X'),
];

/// Replace homoglyph characters with their Latin lookalikes.
pub fn fold_homoglyphs(text: &str) -> String {
    text.chars()
        .map(|c| {
            CYRILLIC_FOLD
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Replace every non-alphanumeric character with a space and squeeze runs
/// of whitespace, for matching phrases through punctuation obfuscation.
pub fn strip_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// True when `c` falls in one of the common emoji blocks.
pub fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F9FF   // symbols, emoticons, transport
        | 0x2600..=0x27BF   // misc symbols, dingbats
        | 0x1F100..=0x1F1FF // enclosed characters, flags
        | 0x2B50..=0x2B55   // stars and circles
        | 0x2934..=0x2935   // arrows
        | 0x3030 | 0x303D   // wavy dash, part alternation mark
        | 0xFE0F            // variation selector
    )
}

/// Number of emoji characters in `text`.
pub fn emoji_count(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}

/// Number of link prefixes in `text`.
pub fn count_links(text: &str) -> usize {
    text.matches("http://").count() + text.matches("https://").count() + text.matches("t.me/").count()
}

/// True when `text` contains a run of `min_run` identical characters.
pub fn has_char_run(text: &str, min_run: usize) -> bool {
    let mut run = 0usize;
    let mut prev = None;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

/// Fraction of alphabetic characters that are uppercase.
pub fn uppercase_ratio(text: &str) -> f64 {
    let alpha: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.is_empty() {
        return 0.0;
    }
    alpha.iter().filter(|c| c.is_uppercase()).count() as f64 / alpha.len() as f64
}

/// Number of currency symbols and currency emoji in `text`.
pub fn currency_count(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(*c, '$' | '€' | '₹' | '£' | '💰' | '💵' | '💸' | '🤑' | '💲'))
        .count()
}

/// Common English stopwords, excluded from lexical-overlap and classifier
/// vocabularies.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "doing", "down", "for", "from", "further", "had", "has", "have", "having", "here", "how",
    "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "why", "will",
    "with", "would", "you", "your",
];

/// True when `word` is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_cyrillic_lookalikes() {
        assert_eq!(fold_homoglyphs("саsіnо"), "casino");
        assert_eq!(fold_homoglyphs("рrоmо соdе"), "promo code");
        assert_eq!(fold_homoglyphs("plain ascii"), "plain ascii");
    }

    #[test]
    fn strips_punctuation_and_squeezes() {
        assert_eq!(strip_punctuation("p-o-r.n!!"), "p o r n");
        assert_eq!(strip_punctuation("  hello,   world  "), "hello world");
    }

    #[test]
    fn counts_emoji() {
        assert_eq!(emoji_count("hello"), 0);
        assert_eq!(emoji_count("🎰🎰💰 win"), 3);
        assert_eq!(emoji_count("⭐ star"), 1);
    }

    #[test]
    fn counts_links() {
        assert_eq!(count_links("see https://a.example and t.me/foo"), 2);
        assert_eq!(count_links("no links"), 0);
    }

    #[test]
    fn detects_char_runs() {
        assert!(has_char_run("loooooool", 5));
        assert!(!has_char_run("loool", 5));
    }

    #[test]
    fn uppercase_ratio_bounds() {
        assert_eq!(uppercase_ratio("ABC"), 1.0);
        assert_eq!(uppercase_ratio("abc"), 0.0);
        assert_eq!(uppercase_ratio("1234"), 0.0);
    }

    #[test]
    fn counts_currency_glyphs() {
        assert_eq!(currency_count("win $100 💰💰"), 3);
    }
}
