//! Markdown task-plan parser.
//!
//! Converts the heading-structured `tasks.md` plan produced during task
//! proposal into a [`Project`] tree:
//!
//! ```text
//! # Project Description
//! # Task Instruction
//! # Detailed Documentation
//! ## Phase N: title
//! ### Module N.M: title
//! #### Task N.M.T: title
//! - **Description:** ...
//! - **Dependencies:** 1.1.1, 1.1.2
//! - **Difficulty:** 3/5
//! - **Unit Tests:**
//!   - **Code Tests:**
//!     - **test_name:** description
//!   - **Visual Tests:**
//!     - **check_name:** description
//! ```
//!
//! Parsing is lenient. Headings that do not match the grammar are dropped
//! together with their body, and missing fields become empty values. The
//! only hard failure is a missing input file.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::types::{Module, Phase, Project, Task, TestBundle, TestCase};
use crate::error::ManifestError;

static TOP_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# .+$").expect("static regex"));
static PHASE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## Phase \d+: .+$").expect("static regex"));
static PHASE_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^## Phase (\d+): (.+)").expect("static regex"));
static GOAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Goal:\*\* (.+)").expect("static regex"));
static MODULE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^### Module \d+\.\d+: .+$").expect("static regex"));
static MODULE_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^### Module (\d+\.\d+): (.+)").expect("static regex"));
static TASK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#### Task \d+\.\d+\.\d+: .+$").expect("static regex"));
static TASK_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#### Task (\d+\.\d+\.\d+): (.+)").expect("static regex"));
static DIFFICULTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- \*\*Difficulty:\*\* (\d+)/5").expect("static regex"));
static TEST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- \*\*([^:]+):\*\* ").expect("static regex"));
static SUB_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{2,4} .*$").expect("static regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

const PROJECT_DESCRIPTION: &str = "# Project Description";
const TASK_INSTRUCTION: &str = "# Task Instruction";
const DETAILED_DOCUMENTATION: &str = "# Detailed Documentation";

const DESCRIPTION_LABEL: &str = "- **Description:** ";
const DEPENDENCIES_LABEL: &str = "- **Dependencies:** ";
const FIELD_TERMINATOR: &str = "\n- **";
const UNIT_TESTS_LABEL: &str = "- **Unit Tests:**";
const UNIT_TESTS_TERMINATOR: &str = "\n####";
const CODE_TESTS_LABEL: &str = "- **Code Tests:**";
const VISUAL_TESTS_LABEL: &str = "- **Visual Tests:**";
const VISUAL_TESTS_TERMINATOR: &str = "\n  - **Visual Tests:**";
const TEST_ITEM_TERMINATOR: &str = "\n    - **";

/// Parses a markdown task plan from disk.
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] if the file does not exist and
/// [`ManifestError::Io`] if it cannot be read.
pub fn parse_file(path: &Path) -> Result<Project, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_str(&content))
}

/// Parses a markdown task plan. Never fails; unrecognized structure is dropped.
pub fn parse_str(content: &str) -> Project {
    let mut project = Project::default();

    for section in split_sections(content, &TOP_HEADER) {
        if section.starts_with(PROJECT_DESCRIPTION) {
            project.project_description = clean_text(&section.replace(PROJECT_DESCRIPTION, ""));
        } else if section.starts_with(TASK_INSTRUCTION) {
            project.task_instruction = clean_text(&section.replace(TASK_INSTRUCTION, ""));
        }
    }

    for section in split_sections(content, &TOP_HEADER) {
        if section.starts_with(DETAILED_DOCUMENTATION) {
            log_dropped_headings(&section);
            project.phases.extend(
                split_sections(&section, &PHASE_HEADER)
                    .into_iter()
                    .filter_map(parse_phase),
            );
        }
    }

    project
}

/// Splits `content` at every header match, returning `header + body` chunks.
/// Text before the first header is discarded.
fn split_sections<'a>(content: &'a str, header: &Regex) -> Vec<&'a str> {
    let starts: Vec<usize> = header.find_iter(content).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            &content[start..end]
        })
        .collect()
}

fn log_dropped_headings(section: &str) {
    for heading in SUB_HEADING.find_iter(section) {
        let line = heading.as_str();
        if !PHASE_PARTS.is_match(line)
            && !MODULE_PARTS.is_match(line)
            && !TASK_PARTS.is_match(line)
        {
            debug!(heading = line, "Dropping heading that does not match the plan grammar");
        }
    }
}

fn parse_phase(section: &str) -> Option<Phase> {
    let caps = PHASE_PARTS.captures(section)?;
    let phase_number = match caps[1].parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            debug!(header = &caps[0], "Dropping phase with out-of-range number");
            return None;
        }
    };

    let goal = GOAL
        .captures(section)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let modules = split_sections(section, &MODULE_HEADER)
        .into_iter()
        .filter_map(parse_module)
        .collect();

    Some(Phase {
        phase_number,
        title: caps[2].trim().to_string(),
        goal,
        modules,
    })
}

fn parse_module(section: &str) -> Option<Module> {
    let caps = MODULE_PARTS.captures(section)?;

    let tasks = split_sections(section, &TASK_HEADER)
        .into_iter()
        .filter_map(parse_task)
        .collect();

    Some(Module {
        module_number: caps[1].to_string(),
        title: caps[2].trim().to_string(),
        tasks,
    })
}

fn parse_task(section: &str) -> Option<Task> {
    let caps = TASK_PARTS.captures(section)?;

    let description = labeled_field(section, DESCRIPTION_LABEL)
        .map(clean_text)
        .unwrap_or_default();

    let dependencies = labeled_field(section, DEPENDENCIES_LABEL)
        .map(parse_dependencies)
        .unwrap_or_default();

    let difficulty = DIFFICULTY
        .captures(section)
        .and_then(|c| c[1].parse::<u8>().ok())
        .filter(|d| {
            let valid = (1..=5).contains(d);
            if !valid {
                debug!(task = &caps[1], difficulty = d, "Dropping out-of-range difficulty");
            }
            valid
        });

    Some(Task {
        task_number: caps[1].to_string(),
        title: caps[2].trim().to_string(),
        description,
        dependencies,
        difficulty,
        unit_tests: parse_unit_tests(section),
    })
}

/// Text after `label` up to the next top-level bullet. Requires at least one
/// character after the label.
fn labeled_field<'a>(content: &'a str, label: &str) -> Option<&'a str> {
    let start = content.find(label)? + label.len();
    let rest = &content[start..];
    let first = rest.chars().next()?.len_utf8();
    let end = rest[first..]
        .find(FIELD_TERMINATOR)
        .map_or(rest.len(), |i| first + i);
    Some(&rest[..end])
}

/// Text after `label` up to `terminator` or the end. May be empty.
fn section_after<'a>(content: &'a str, label: &str, terminator: Option<&str>) -> Option<&'a str> {
    let start = content.find(label)? + label.len();
    let rest = &content[start..];
    let end = terminator
        .and_then(|t| rest.find(t))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_dependencies(raw: &str) -> Vec<String> {
    raw.trim()
        .split(',')
        .map(str::trim)
        .filter(|dep| !dep.is_empty() && !dep.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

fn parse_unit_tests(section: &str) -> TestBundle {
    let Some(tests) = section_after(section, UNIT_TESTS_LABEL, Some(UNIT_TESTS_TERMINATOR)) else {
        return TestBundle::default();
    };

    let code_tests = section_after(tests, CODE_TESTS_LABEL, Some(VISUAL_TESTS_TERMINATOR))
        .map(parse_test_items)
        .unwrap_or_default();
    let visual_tests = section_after(tests, VISUAL_TESTS_LABEL, None)
        .map(parse_test_items)
        .unwrap_or_default();

    TestBundle {
        code_tests,
        visual_tests,
    }
}

fn parse_test_items(content: &str) -> Vec<TestCase> {
    let mut tests = Vec::new();
    let mut pos = 0;

    while let Some(caps) = TEST_ITEM.captures_at(content, pos) {
        let Some(whole) = caps.get(0) else { break };
        let rest = &content[whole.end()..];
        let Some(first) = rest.chars().next().map(char::len_utf8) else {
            break;
        };
        let len = rest[first..]
            .find(TEST_ITEM_TERMINATOR)
            .map_or(rest.len(), |i| first + i);

        tests.push(TestCase {
            name: caps[1].trim().to_string(),
            description: clean_text(&rest[..len]),
        });
        pos = whole.end() + len;
    }

    tests
}

/// Collapses whitespace runs, newlines included, to single spaces and trims.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}
