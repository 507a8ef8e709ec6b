//! Collision-free placeholder tokens.
//!
//! Two passes need to hide a span of text from later rewriting and put it
//! back afterwards: the content segmenter hides `tabular` blocks from the
//! normaliser, and the normaliser hides math from its own rules. Both use a
//! [`Placeholders`] set local to one call.
//!
//! A token is `S<index>S` where `S` is a Private Use Area character chosen
//! so that it does not occur anywhere in the text being processed. Nested
//! uses therefore pick different sentinels automatically: the inner text
//! already contains the outer sentinel, so the inner set skips it.

/// First and last Private Use Area code points tried as sentinels.
const SENTINEL_FIRST: u32 = 0xE000;
const SENTINEL_LAST: u32 = 0xF8FF;

/// One piece of text split on placeholder tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    Slot(usize),
}

/// Stashed spans for one pass over one block of text.
#[derive(Debug)]
pub struct Placeholders {
    sentinel: char,
    stashed: Vec<String>,
}

impl Placeholders {
    /// A set whose sentinel does not occur in `text`.
    ///
    /// Falls back to U+FFFC if the whole Private Use Area is somehow in use.
    pub fn for_text(text: &str) -> Self {
        let sentinel = (SENTINEL_FIRST..=SENTINEL_LAST)
            .filter_map(char::from_u32)
            .find(|c| !text.contains(*c))
            .unwrap_or('\u{FFFC}');
        Self {
            sentinel,
            stashed: Vec::new(),
        }
    }

    /// Remember `original` and return the token that stands in for it.
    pub fn stash(&mut self, original: impl Into<String>) -> String {
        let index = self.stashed.len();
        self.stashed.push(original.into());
        format!("{s}{index}{s}", s = self.sentinel)
    }

    /// Split `text` into text pieces and slots, in order.
    ///
    /// Empty text pieces are dropped. A malformed token (sentinel without a
    /// valid index) is kept as text.
    pub fn split<'t>(&self, text: &'t str) -> Vec<Piece<'t>> {
        let mut pieces = Vec::new();
        // Odd parts sit between a pair of sentinels.
        for (n, part) in text.split(self.sentinel).enumerate() {
            if n % 2 == 1 {
                if let Ok(i) = part.parse::<usize>() {
                    if i < self.stashed.len() {
                        pieces.push(Piece::Slot(i));
                        continue;
                    }
                }
            }
            if !part.is_empty() {
                pieces.push(Piece::Text(part));
            }
        }
        pieces
    }

    /// Replace every token in `text` with its stashed original.
    pub fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for piece in self.split(text) {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Slot(i) => out.push_str(&self.stashed[i]),
            }
        }
        out
    }
}
