//! Parsing of agent responses into task estimates.
//!
//! Agents are asked for lines shaped like `- [1.5h] Fixed login redirect`.
//! They don't always comply, so parsing is lenient: bullets are optional,
//! the estimate is optional (0.5h when absent), and anything too short to
//! be a task is dropped.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Effort, TaskEstimate};

/// Leading `[1.5h]` estimate token.
static ESTIMATE_RE: OnceLock<Regex> = OnceLock::new();

fn estimate_regex() -> &'static Regex {
    ESTIMATE_RE.get_or_init(|| Regex::new(r"^\[(\d+\.?\d*)\s*[hH]\]\s*").expect("valid regex"))
}

const MIN_LINE_CHARS: usize = 5;

pub fn parse_task_lines(response: &str) -> Vec<TaskEstimate> {
    response.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<TaskEstimate> {
    let line = strip_bullet(line.trim());
    if line.chars().count() < MIN_LINE_CHARS {
        return None;
    }

    let (estimated, description) = match estimate_regex().captures(line) {
        Some(caps) => {
            let hours = caps[1].parse::<f64>().ok();
            let rest = &line[caps[0].len()..];
            (hours.map(Effort::from_hours).unwrap_or_default(), rest.trim())
        }
        None => (Effort::default(), line),
    };

    if description.is_empty() {
        return None;
    }
    Some(TaskEstimate {
        description: description.to_string(),
        estimated,
    })
}

/// Drop a leading `-` or `*` bullet. The marker must be followed by
/// whitespace so `*emphasis*` and `-flag` survive.
fn strip_bullet(line: &str) -> &str {
    for marker in ['-', '*'] {
        if let Some(rest) = line.strip_prefix(marker) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("- [2.0h] Implemented user authentication", "Implemented user authentication", 4)]
    #[case("* [0.2h] Fixed typo in footer", "Fixed typo in footer", 1)]
    #[case("[0.74h] Tweaked logging", "Tweaked logging", 1)]
    #[case("[1.26h] Refactored storage", "Refactored storage", 3)]
    #[case("Updated dependencies", "Updated dependencies", 1)]
    #[case("-   [3h]   Migrated CI pipeline  ", "Migrated CI pipeline", 6)]
    #[case("[1.5 H] Reviewed pull requests", "Reviewed pull requests", 3)]
    #[case("*emphasis* kept as written", "*emphasis* kept as written", 1)]
    fn parses_single_lines(#[case] input: &str, #[case] description: &str, #[case] halves: u32) {
        let tasks = parse_task_lines(input);
        assert_eq!(tasks.len(), 1, "input: {:?}", input);
        assert_eq!(tasks[0].description, description);
        assert_eq!(tasks[0].estimated.halves(), halves);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("- ok")]
    #[case("abcd")]
    #[case("[2h]")]
    #[case("- [1.0h]   ")]
    fn drops_noise(#[case] input: &str) {
        assert!(parse_task_lines(input).is_empty(), "input: {:?}", input);
    }

    #[test]
    fn parses_a_full_response() {
        let response = "Here are the tasks:\n\n\
                        - [2.0h] Implemented user authentication system\n\
                        - [0.5h] Fixed login button styling\n\
                        \n\
                        - [1.5h] Refactored database connection handling\n";
        let tasks = parse_task_lines(response);
        let descriptions: Vec<&str> = tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "Here are the tasks:",
                "Implemented user authentication system",
                "Fixed login button styling",
                "Refactored database connection handling",
            ]
        );
        let hours: Vec<f64> = tasks.iter().map(|t| t.estimated.hours()).collect();
        assert_eq!(hours, vec![0.5, 2.0, 0.5, 1.5]);
    }
}
