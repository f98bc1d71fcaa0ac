// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw problem and equation text before the number
// transfer tokenizes it.
//
// Corpora mix half-width and full-width forms of the same
// characters (Chinese sets write "（３＋５）" for "(3+5)"), and
// scraped text carries non-breaking and zero-width spaces. Left
// alone, the number regex misses full-width digits and the
// vocabulary gets two entries for one symbol.
//
// Cleaning steps (applied in order):
//   1. Map full-width ASCII variants (U+FF01..U+FF5E) to ASCII
//   2. Map ideographic / non-breaking / zero-width spaces to ' '
//   3. Map control characters to ' '
//   4. Collapse whitespace runs to one space and trim
//
// Reference: Rust Book §8 (Strings in Rust)

const FULL_WIDTH_START: u32 = 0xFF01;
const FULL_WIDTH_END:   u32 = 0xFF5E;
const FULL_WIDTH_SHIFT: u32 = 0xFEE0;

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalise one line of problem or equation text.
    pub fn clean(&self, text: &str) -> String {
        let mapped: String = text.chars().map(normalise_char).collect();

        let mut out        = String::with_capacity(mapped.len());
        let mut last_space = true;
        for c in mapped.chars() {
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }
}

fn normalise_char(c: char) -> char {
    let code = c as u32;
    if (FULL_WIDTH_START..=FULL_WIDTH_END).contains(&code) {
        return char::from_u32(code - FULL_WIDTH_SHIFT).unwrap_or(c);
    }
    match c {
        '\u{3000}' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
        c if c.is_whitespace() || c.is_control() => ' ',
        c => c,
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
