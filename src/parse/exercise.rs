//! Field extraction for one exercise.
//!
//! Sections are located independently, so a missing or malformed section
//! never hides another one: an exercise with a broken `\loigiai` still gets
//! its question and choices.

use super::content::segment_content;
use super::normalize::normalize;
use super::scan::{
    command_argument, environments, find_command, find_environment, remove_ranges,
    top_level_groups,
};
use crate::model::{Choice, DiagramSource, ParsedExercise, RawExercise};
use tracing::{debug, warn};

const QUESTION_WRAPPER: &str = "immini";
const CHOICE: &str = "choice";
const CORRECT_MARKER: &str = "\\True";
const SOLUTION: &str = "loigiai";
const DIAGRAM_ENV: &str = "tikzpicture";

/// Parse one raw exercise. Never fails; absent sections come back empty.
pub fn parse_exercise(raw: &RawExercise<'_>) -> ParsedExercise {
    let text = raw.as_str();

    let question = segment_content(&question_body(text));
    let (choices, correct_index) = parse_choices(text, raw.offset);
    let diagram = find_environment(text, DIAGRAM_ENV, 0)
        .map(|env| DiagramSource(text[env.span()].to_string()));
    let solution = command_argument(text, SOLUTION)
        .map(|(_, group)| segment_content(&without_diagrams(&text[group.inner])));

    debug!(
        "Parsed exercise at byte {}: {} question fragment(s), {} choice(s), diagram={}, solution={}",
        raw.offset,
        question.len(),
        choices.len(),
        diagram.is_some(),
        solution.is_some()
    );

    ParsedExercise {
        question,
        choices,
        correct_index,
        diagram,
        solution,
    }
}

/// The question markup: the `\immini` first argument (or the whole
/// exercise), cut at `\choice`, with diagrams and the solution removed.
fn question_body(text: &str) -> String {
    let target = match command_argument(text, QUESTION_WRAPPER) {
        Some((_, group)) => &text[group.inner],
        None => text,
    };
    let target = match find_command(target, CHOICE, 0) {
        Some(cut) => &target[..cut],
        None => target,
    };

    let mut cut_out: Vec<_> = environments(target, DIAGRAM_ENV).map(|env| env.span()).collect();
    if let Some((at, group)) = command_argument(target, SOLUTION) {
        cut_out.push(at..group.end);
    }
    remove_ranges(target, cut_out)
}

/// `text` with every diagram cut out; diagrams are rendered as images.
fn without_diagrams(text: &str) -> String {
    remove_ranges(text, environments(text, DIAGRAM_ENV).map(|env| env.span()).collect())
}

/// The span after `\choice`, up to the first diagram, solution, exercise
/// end or end of input.
fn choice_span(text: &str) -> Option<&str> {
    let start = find_command(text, CHOICE, 0)? + CHOICE.len() + 1;
    let rest = &text[start..];
    let end = [
        rest.find("\\begin{tikzpicture}"),
        find_command(rest, SOLUTION, 0),
        rest.find("\\end{ex}"),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_choices(text: &str, offset: usize) -> (Vec<Choice>, Option<usize>) {
    let Some(span) = choice_span(text) else {
        return (Vec::new(), None);
    };

    let mut choices = Vec::new();
    let mut correct_index = None;
    for group in top_level_groups(span) {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let (body, marked) = match strip_marker(group) {
            Some(body) => (body, true),
            None => (group, false),
        };
        if marked && correct_index.is_some() {
            warn!(
                "Exercise at byte {} marks more than one correct choice; keeping the first",
                offset
            );
        }
        let is_correct = marked && correct_index.is_none();
        if is_correct {
            correct_index = Some(choices.len());
        }
        choices.push(Choice {
            text: normalize(body),
            is_correct,
        });
    }
    (choices, correct_index)
}

/// Choice text with a leading `\True` removed, if it has one.
fn strip_marker(choice: &str) -> Option<&str> {
    let rest = choice.strip_prefix(CORRECT_MARKER)?;
    if rest.as_bytes().first().is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentFragment;

    fn parse(text: &str) -> ParsedExercise {
        parse_exercise(&RawExercise { text, offset: 0 })
    }

    const FULL: &str = r"Cho bảng số liệu sau:
\begin{tabular}{|c|c|}
\hline
$x$ & $y$ \\
\hline
1 & 2 \\
\hline
\end{tabular}
Giá trị của $y$ khi $x = 1$ là
\choice
{$0$}
{\True $2$}
{$1$}
{$3$}
\loigiai{Từ bảng ta có $y = 2$.}";

    #[test]
    fn full_exercise() {
        let ex = parse(FULL);

        assert_eq!(ex.question.len(), 3);
        assert_eq!(ex.question[0].as_text(), Some("Cho bảng số liệu sau:"));
        let grid = ex.question[1].as_table().unwrap();
        assert_eq!(grid.column_count, 2);
        assert_eq!(grid.rows, vec![vec!["$x$", "$y$"], vec!["1", "2"]]);
        assert_eq!(ex.question[2].as_text(), Some("Giá trị của $y$ khi $x = 1$ là"));

        let texts: Vec<&str> = ex.choices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["$0$", "$2$", "$1$", "$3$"]);
        assert_eq!(ex.correct_index, Some(1));
        assert_eq!(ex.correct_label(), Some('B'));
        assert!(ex.choices[1].is_correct);

        assert_eq!(
            ex.solution,
            Some(vec![ContentFragment::Text("Từ bảng ta có $y = 2$.".into())])
        );
        assert_eq!(ex.diagram, None);
    }

    #[test]
    fn choices_never_leak_into_question() {
        let ex = parse(
            r"\immini{Câu hỏi \choice{a}{b}}{\begin{tikzpicture}\draw (0,0)--(1,1);\end{tikzpicture}}",
        );
        assert_eq!(ex.question, vec![ContentFragment::Text("Câu hỏi".into())]);
        assert_eq!(ex.choices.len(), 2);
    }

    #[test]
    fn immini_diagram_is_extracted_verbatim() {
        let tikz = "\\begin{tikzpicture}\n  \\draw (0,0) -- (1,1);\n\\end{tikzpicture}";
        let ex = parse(&format!("\\immini{{Hình vẽ \\choice{{\\True A}}{{B}}}}{{{tikz}}}"));
        assert_eq!(ex.diagram.as_ref().map(DiagramSource::as_str), Some(tikz));
        assert_eq!(ex.correct_index, Some(0));
        assert_eq!(ex.choices.len(), 2);
    }

    #[test]
    fn diagram_is_removed_from_question_body() {
        let ex = parse(r"Xét hình \begin{tikzpicture}\node {x};\end{tikzpicture} sau \choice{1}{2}");
        assert_eq!(ex.question, vec![ContentFragment::Text("Xét hình sau".into())]);
        assert!(ex.diagram.is_some());
    }

    #[test]
    fn diagram_inside_solution_is_not_repeated_as_text() {
        let ex = parse(
            r"Q \choice{A}{\True B} \loigiai{Xét hình \begin{tikzpicture}\draw (0,0) -- (1,1);\end{tikzpicture} nên chọn B.}",
        );
        assert!(ex.diagram.is_some());
        assert_eq!(
            ex.solution,
            Some(vec![ContentFragment::Text("Xét hình nên chọn B.".into())])
        );
    }

    #[test]
    fn immini_with_option_is_the_question_wrapper() {
        let ex = parse(
            r"\immini[thm]{Câu hỏi \choice{a}{\True b}}{\begin{tikzpicture}\draw (0,0)--(1,1);\end{tikzpicture}}",
        );
        assert_eq!(ex.question, vec![ContentFragment::Text("Câu hỏi".into())]);
        assert_eq!(ex.correct_index, Some(1));
        assert!(ex.diagram.is_some());
    }

    #[test]
    fn nested_braces_inside_choices() {
        let ex = parse(r"Q \choice{$\frac{1}{2}$}{$\{1;2\}$}{\textbf{x}}{}");
        let texts: Vec<&str> = ex.choices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec![r"$\frac{1}{2}$", r"$\{1;2\}$", "x"]);
    }

    #[test]
    fn first_correct_marker_wins() {
        let ex = parse(r"Q \choice{a}{\True b}{\True c}");
        assert_eq!(ex.correct_index, Some(1));
        assert!(!ex.choices[2].is_correct);
        assert_eq!(ex.choices[2].text, "c");
    }

    #[test]
    fn true_prefix_of_longer_command_is_not_a_marker() {
        let ex = parse(r"Q \choice{\Truely a}{b}");
        assert_eq!(ex.correct_index, None);
    }

    #[test]
    fn missing_sections_are_empty() {
        let ex = parse("Chỉ có đề bài.");
        assert_eq!(ex.question, vec![ContentFragment::Text("Chỉ có đề bài.".into())]);
        assert!(ex.choices.is_empty());
        assert_eq!(ex.correct_index, None);
        assert_eq!(ex.diagram, None);
        assert_eq!(ex.solution, None);
    }

    #[test]
    fn choice_span_stops_at_solution() {
        let ex = parse(r"Q \choice{a}{b} \loigiai{Vì {a} đúng}");
        assert_eq!(ex.choices.len(), 2);
        assert!(ex.solution.is_some());
    }

    #[test]
    fn unterminated_solution_is_absent() {
        let ex = parse(r"Q \choice{a}{\True b} \loigiai{never closed");
        assert_eq!(ex.solution, None);
        assert_eq!(ex.correct_index, Some(1));
    }
}
