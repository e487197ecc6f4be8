//! Response-language selection from the script of the inbound text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageMode {
    /// CJK text with no Latin letters.
    Chinese,
    /// Latin letters with no CJK.
    English,
    /// Mixed scripts, or nothing to go on.
    Bilingual,
}

impl LanguageMode {
    /// Instruction line placed at the top of the prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            LanguageMode::Chinese => "Reply in Simplified Chinese only.",
            LanguageMode::English => "Reply in English only.",
            LanguageMode::Bilingual => {
                "Reply in BOTH English and Simplified Chinese in ONE message, English first."
            }
        }
    }
}

pub fn classify(text: &str) -> LanguageMode {
    let has_cjk = text.chars().any(is_cjk);
    let has_latin = text.chars().any(is_latin_letter);
    match (has_cjk, has_latin) {
        (true, false) => LanguageMode::Chinese,
        (false, true) => LanguageMode::English,
        _ => LanguageMode::Bilingual,
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'     // Extension A
        | '\u{4E00}'..='\u{9FFF}'   // Unified Ideographs
        | '\u{F900}'..='\u{FAFF}'   // Compatibility Ideographs
        | '\u{20000}'..='\u{2FA1F}' // Extensions B-F, supplement
    )
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (matches!(c, '\u{00C0}'..='\u{024F}') && c.is_alphabetic())
}
