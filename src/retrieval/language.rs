//! Script-based query language detection

/// Guess a language tag from the dominant Unicode script of `text`
///
/// Only distinguishes languages by script: any Latin-script text is tagged
/// "en". Returns `None` when the text has no alphabetic characters.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let mut counts = [0usize; Script::COUNT];
    let mut kana = false;

    for c in text.chars().filter(|c| c.is_alphabetic()) {
        let script = Script::of(c);
        if script == Script::Kana {
            kana = true;
        }
        counts[script as usize] += 1;
    }

    // Japanese mixes kanji with kana; any kana settles it
    if kana {
        return Some("ja");
    }

    let (index, count) = counts
        .iter()
        .enumerate()
        .max_by_key(|&(index, count)| (*count, std::cmp::Reverse(index)))?;

    if *count == 0 {
        return None;
    }

    Script::ALL.get(index).and_then(|s| s.language())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Hangul,
    Kana,
    Han,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Devanagari,
    Thai,
    Other,
}

impl Script {
    const COUNT: usize = 11;

    const ALL: [Script; Self::COUNT] = [
        Self::Latin,
        Self::Hangul,
        Self::Kana,
        Self::Han,
        Self::Cyrillic,
        Self::Greek,
        Self::Arabic,
        Self::Hebrew,
        Self::Devanagari,
        Self::Thai,
        Self::Other,
    ];

    fn of(c: char) -> Self {
        match c as u32 {
            0x0041..=0x024F | 0x1E00..=0x1EFF => Self::Latin,
            0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Self::Hangul,
            0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Self::Kana,
            0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Self::Han,
            0x0400..=0x052F => Self::Cyrillic,
            0x0370..=0x03FF => Self::Greek,
            0x0600..=0x06FF | 0x0750..=0x077F => Self::Arabic,
            0x0590..=0x05FF => Self::Hebrew,
            0x0900..=0x097F => Self::Devanagari,
            0x0E00..=0x0E7F => Self::Thai,
            _ => Self::Other,
        }
    }

    fn language(&self) -> Option<&'static str> {
        match self {
            Self::Latin => Some("en"),
            Self::Hangul => Some("ko"),
            Self::Kana => Some("ja"),
            Self::Han => Some("zh"),
            Self::Cyrillic => Some("ru"),
            Self::Greek => Some("el"),
            Self::Arabic => Some("ar"),
            Self::Hebrew => Some("he"),
            Self::Devanagari => Some("hi"),
            Self::Thai => Some("th"),
            Self::Other => None,
        }
    }
}
