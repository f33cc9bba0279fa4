//! Pull the plan document path out of the planner's final message.
//!
//! The plan template asks the assistant to finish with a line
//! `PLAN_FILE: agentic/specs/<date>-<slug>.md`. Those prefixed lines are
//! trusted first. Failing that, lines that are nothing but a path and lines
//! inside fenced code blocks are considered. In each class the last
//! candidate that exists under the working directory wins.

use tracing::debug;

use crate::layout::Layout;

const SPECS_PREFIX: &str = "agentic/specs/";
const PLAN_FILE_MARKER: &str = "plan_file:";

/// Characters that end a path token in prose or markdown.
fn ends_path(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '`' | '"' | '\'' | '(' | ')' | '[' | ']' | '<' | '>' | '*' | ',' | ';'
        )
}

/// The `agentic/specs/…\.md` part of `token`, if any. Absolute paths are
/// reduced to their repo-relative suffix. Sentence punctuation after the
/// path is dropped; any other suffix (`a.mdx`, `a.md.bak`) rejects it.
fn spec_path_in(token: &str) -> Option<String> {
    let start = token.find(SPECS_PREFIX)?;
    if start > 0 && !token[..start].ends_with('/') && !token[..start].ends_with(ends_path) {
        return None;
    }
    let tail = &token[start..];
    let run = tail[..tail.find(ends_path).unwrap_or(tail.len())]
        .trim_end_matches(['.', ':', '!', '?']);
    (run.ends_with(".md") && run.len() > SPECS_PREFIX.len() + ".md".len())
        .then(|| run.to_string())
}

/// Strip list bullets and emphasis from the start of a line.
fn strip_decoration(line: &str) -> &str {
    let mut s = line.trim();
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = s.strip_prefix(bullet) {
            s = rest.trim_start();
            break;
        }
    }
    s.trim_matches(|c| matches!(c, '`' | '"' | '\'' | '*' | '_'))
        .trim()
}

#[derive(Debug, Default)]
struct Candidates {
    prefixed: Vec<String>,
    heuristic: Vec<String>,
}

fn collect(text: &str) -> Candidates {
    let mut found = Candidates::default();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }

        let bare = strip_decoration(trimmed);
        let lowered = bare.to_ascii_lowercase();
        if lowered.starts_with(PLAN_FILE_MARKER) {
            if let Some(path) = spec_path_in(&bare[PLAN_FILE_MARKER.len()..]) {
                found.prefixed.push(path);
            }
            continue;
        }

        if in_fence {
            found
                .heuristic
                .extend(trimmed.split(ends_path).filter_map(spec_path_in));
        } else if !bare.is_empty() && !bare.contains(char::is_whitespace) {
            found.heuristic.extend(spec_path_in(bare));
        }
    }
    found
}

/// Find the plan path in `text`, verified to exist under the working
/// directory. Returns a working-directory-relative path.
pub fn extract_plan_path(text: &str, layout: &Layout) -> Option<String> {
    let candidates = collect(text);
    let existing = |paths: &[String]| {
        paths
            .iter()
            .rev()
            .find(|p| {
                let ok = layout.resolve_existing_file(p).is_some();
                if !ok {
                    debug!(path = p.as_str(), "plan path candidate does not exist");
                }
                ok
            })
            .cloned()
    };
    existing(&candidates.prefixed).or_else(|| existing(&candidates.heuristic))
}
