//! Markup parsing: raw `ex_test` text → [`crate::model::ParsedExercise`].
//!
//! ```text
//! input
//!  ├─ segment    \begin{ex}…\end{ex} blocks, lazily
//!  ├─ exercise   question / choices / diagram / solution per block
//!  ├─ content    prose and tables in source order
//!  ├─ table      tabular → rectangular grid
//!  └─ normalize  strip decorative LaTeX, keep math verbatim
//! ```
//!
//! Everything here is pure and synchronous. Brace matching goes through
//! [`scan`]; temporary span hiding goes through [`placeholder`].

pub mod content;
pub mod exercise;
pub mod normalize;
pub mod placeholder;
pub mod scan;
pub mod segment;
pub mod table;

pub use content::segment_content;
pub use exercise::parse_exercise;
pub use normalize::normalize;
pub use segment::{exercises, parse_document, ExerciseBlocks};
pub use table::transcode;
