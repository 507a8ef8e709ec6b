//! Exercise segmentation: `\begin{ex}…\end{ex}` blocks in source order.

use super::exercise::parse_exercise;
use crate::error::Tex2DocxError;
use crate::model::{ParsedExercise, RawExercise};
use tracing::{debug, warn};

const BEGIN: &str = "\\begin{ex}";
const END: &str = "\\end{ex}";

/// Lazy iterator over the exercises of one input.
///
/// Whitespace-only blocks are skipped. A trailing `\begin{ex}` without a
/// matching `\end{ex}` ends the iteration; it is not an error.
pub struct ExerciseBlocks<'a> {
    input: &'a str,
    pos: usize,
}

/// Iterate over the exercise blocks in `input`.
pub fn exercises(input: &str) -> ExerciseBlocks<'_> {
    ExerciseBlocks { input, pos: 0 }
}

impl<'a> Iterator for ExerciseBlocks<'a> {
    type Item = RawExercise<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.input.get(self.pos..)?;
            let begin = self.pos + rest.find(BEGIN)?;
            let body_start = begin + BEGIN.len();
            let Some(body_len) = self.input[body_start..].find(END) else {
                warn!("Unterminated \\begin{{ex}} at byte {}; ignoring the rest", begin);
                self.pos = self.input.len();
                return None;
            };
            let body_end = body_start + body_len;
            self.pos = body_end + END.len();

            let body = &self.input[body_start..body_end];
            let text = body.trim();
            if text.is_empty() {
                debug!("Skipping empty exercise block at byte {}", begin);
                continue;
            }
            let leading = body.len() - body.trim_start().len();
            return Some(RawExercise {
                text,
                offset: body_start + leading,
            });
        }
    }
}

/// Segment and parse a whole input.
///
/// # Errors
///
/// [`Tex2DocxError::NoExercisesFound`] when the input has no non-empty
/// exercise block. Nothing else in parsing is an error.
pub fn parse_document(markup: &str) -> Result<Vec<ParsedExercise>, Tex2DocxError> {
    let parsed: Vec<ParsedExercise> = exercises(markup).map(|raw| parse_exercise(&raw)).collect();
    if parsed.is_empty() {
        return Err(Tex2DocxError::NoExercisesFound);
    }
    debug!("Parsed {} exercise(s)", parsed.len());
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_come_out_in_source_order() {
        let input = "preamble\n\\begin{ex} one \\end{ex}\ntext\n\\begin{ex}\ntwo\n\\end{ex}";
        let texts: Vec<&str> = exercises(input).map(|r| r.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn empty_blocks_are_dropped() {
        let input = "\\begin{ex} \n \\end{ex}\\begin{ex}x\\end{ex}\\begin{ex}\\end{ex}";
        let texts: Vec<&str> = exercises(input).map(|r| r.text).collect();
        assert_eq!(texts, vec!["x"]);
    }

    #[test]
    fn offset_points_at_trimmed_text() {
        let input = "ab\\begin{ex}\n  body \\end{ex}";
        let raw = exercises(input).next().unwrap();
        assert_eq!(&input[raw.offset..raw.offset + raw.text.len()], "body");
    }

    #[test]
    fn unterminated_trailing_block_stops_iteration() {
        let input = "\\begin{ex}a\\end{ex}\\begin{ex}never closed";
        let texts: Vec<&str> = exercises(input).map(|r| r.text).collect();
        assert_eq!(texts, vec!["a"]);
    }

    #[test]
    fn no_delimiters_is_an_error() {
        let err = parse_document("Chỉ là văn bản.").unwrap_err();
        assert!(matches!(err, Tex2DocxError::NoExercisesFound));
    }

    #[test]
    fn only_empty_blocks_is_an_error() {
        assert!(matches!(
            parse_document("\\begin{ex}   \\end{ex}"),
            Err(Tex2DocxError::NoExercisesFound)
        ));
    }

    #[test]
    fn parse_document_parses_every_block() {
        let input = "\\begin{ex}Q1 \\choice{a}{\\True b}\\end{ex}\n\\begin{ex}Q2\\end{ex}";
        let parsed = parse_document(input).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].correct_index, Some(1));
        assert!(parsed[1].choices.is_empty());
    }
}
