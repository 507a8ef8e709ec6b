//! Order-preserving split of a content block into prose and tables.

use super::normalize::{normalize, strip_comments};
use super::placeholder::{Piece, Placeholders};
use super::scan::{argument_at, environments, skip_optional_argument};
use super::table::transcode;
use crate::model::{ContentFragment, TableGrid};
use tracing::debug;

/// Split a question or solution body into [`ContentFragment`]s.
///
/// Every `tabular` environment is swapped for a placeholder token, the
/// remaining prose is normalised as one piece (so a sentence that wraps
/// around a table keeps its spacing rules), and the result is walked in
/// order: prose between tokens becomes [`ContentFragment::Text`], each token
/// becomes the [`ContentFragment::Table`] transcoded from its markup.
pub fn segment_content(block: &str) -> Vec<ContentFragment> {
    let block = strip_comments(block);
    let mut slots = Placeholders::for_text(&block);
    let mut grids: Vec<TableGrid> = Vec::new();
    let mut prose = String::with_capacity(block.len());
    let mut copied = 0;

    for env in environments(&block, "tabular") {
        let spec_at = skip_optional_argument(&block, env.body.start);
        let (spec, body) = match argument_at(&block, spec_at) {
            Some(group) => (&block[group.inner], &block[group.end..env.body.end]),
            None => ("", &block[spec_at..env.body.end]),
        };

        let grid = transcode(spec, body);
        prose.push_str(&block[copied..env.start]);
        // Spaces keep the token from gluing onto neighbouring words.
        prose.push(' ');
        if grid.is_empty() {
            debug!("Dropping tabular with no content rows at byte {}", env.start);
        } else {
            prose.push_str(&slots.stash(&block[env.span()]));
            prose.push(' ');
            grids.push(grid);
        }
        copied = env.end;
    }
    prose.push_str(&block[copied..]);

    let normalized = normalize(&prose);
    let mut fragments = Vec::new();
    for piece in slots.split(&normalized) {
        match piece {
            Piece::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    fragments.push(ContentFragment::Text(text.to_string()));
                }
            }
            Piece::Slot(i) => fragments.push(ContentFragment::Table(grids[i].clone())),
        }
    }
    fragments
}
