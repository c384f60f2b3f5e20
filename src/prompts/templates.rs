//! Built-in prompt templates.
//!
//! Templates are rendered with Tera; variables use `{{ name }}`. Each one
//! can be replaced by a `<name>.jinja` file in the prompt override
//! directory.

pub const PROPOSE_PROJECTS_SYSTEM: &str = r##"You design self-contained software projects used to train and evaluate coding agents.

Each project must be implementable from scratch in a single repository, have a core that requires real algorithmic work, and be testable with automated unit tests. Avoid projects whose core could be delegated to an existing high-level library."##;

pub const PROPOSE_PROJECTS_USER: &str = r##"Propose {{ num_projects }} diverse project(s).

For every project use exactly this format:

Project <number>:
<proposed_project>A detailed description of the project and its features.</proposed_project>
<repo_name>snake_case_repository_name</repo_name>
<programming_language>Python</programming_language>
<constraints>Libraries and techniques that are NOT allowed, so that the core logic must be implemented by hand.</constraints>"##;

pub const PROPOSE_TASKS_SYSTEM: &str = r##"You are a senior engineer decomposing a project into an incremental implementation plan.

Write the plan in markdown with these top-level sections: `# Project Description`, `# Task Instruction`, `# Detailed Documentation`. Inside the documentation use `## Phase N: title` (with a `**Goal:**` line), `### Module N.M: title` and `#### Task N.M.T: title`. Every task lists `- **Description:**`, `- **Dependencies:**` (task numbers or None), `- **Difficulty:** D/5` and `- **Unit Tests:**` with nested `  - **Code Tests:**` and `  - **Visual Tests:**` bullets of the form `    - **test_name:** what it checks`.

Wrap the whole plan in <tasks></tasks>."##;

pub const PROPOSE_TASKS_USER: &str = r##"Project description:
{{ project_description }}

Constraints:
{{ constraints }}

Produce the complete task plan inside <tasks></tasks>."##;

pub const PROPOSE_TASKS_USER_CONTINUE: &str = r##"Project description:
{{ project_description }}

Constraints:
{{ constraints }}

Your previous answer was cut off:

{{ response }}

Continue exactly where it stopped. Do not repeat any text that was already written and finish with </tasks>."##;

pub const UNIT_TEST_SYSTEM: &str = r##"You write detailed unit test proposals for one task of a project plan. For every listed test describe the setup, the inputs, the exact expected outputs and the edge cases it covers. Tests must be deterministic and runnable with pytest."##;

pub const UNIT_TEST_USER: &str = r##"Project description:
{{ project_description }}

Full task plan:
{{ tasks_prompt }}

Tests already proposed for earlier tasks:
{{ previous_unit_tests }}

Write the detailed proposal for:
{{ unit_test_prompt }}"##;

pub const SETUP_PROJECT_REPO_OPENHANDS: &str = r##"Set up the repository skeleton for the following project. Read tasks.md for the full plan.

Project description:
{{ project_description }}

Constraints:
{{ constraints }}

Create the package layout under src/, stub every planned public function with `raise NotImplementedError`, add a Dockerfile able to run the test suite, and do not implement any task yet."##;

pub const GENERATE_UNIT_TEST_OPENHANDS: &str = r##"Project:
{{ project_task }}

Implement the unit tests for this task inside the tests/ directory:
{{ unit_test_prompt }}

Write the tests to tests/test_<task number with dots replaced by underscores>.py and a runner script tests/<task number>.sh that exits with status 0 only when every test of this task passes. Do not implement the task itself."##;

pub const FINISH_TASK_OPENHANDS: &str = r##"Implement task {{ task_number }}.

Task description:
{{ task_description }}

Constraints:
{{ constraints }}

The unit tests under tests/ define the expected behavior. Do not modify anything in tests/. Make sure every existing test script in tests/ still passes."##;

pub const PROPOSE_ISSUE_SYSTEM: &str = r##"You design realistic bugs for a software engineering benchmark. Given a working implementation and the tests that cover it, propose one subtle defect.

Answer with two tagged blocks:
<issue>A precise technical description of the code change that introduces the defect.</issue>
<description>A user-facing bug report, written like a GitHub issue, that describes the symptom without revealing the cause.</description>"##;

pub const PROPOSE_ISSUE_USER: &str = r##"Project description:
{{ project_description }}

Test overview:
{{ test_prompt }}

Test code:
```python
{{ test_code }}
```"##;

pub const APPLY_ISSUE_OPENHANDS: &str = r##"Introduce the following defect into the code base of this project.

Project description:
{{ project_description }}

Affected task {{ task_number }}:
{{ task_description }}

Defect:
{{ issue_description }}

Only change implementation files. Do not touch tests/ and do not leave comments that reveal the defect. The tests of task {{ task_number }} should fail afterwards."##;

pub const APPLY_ISSUE_SWT_OPENHANDS: &str = r##"Introduce the following defect into the code base of this project.

Project description:
{{ project_description }}

Affected task {{ task_number }}:
{{ task_description }}

Defect:
{{ issue_description }}

Only change implementation files. Do not touch tests/ and do not leave comments that reveal the defect. The existing tests must keep passing: the defect has to hide in behavior they do not cover."##;

pub const FIX_ISSUE_OPENHANDS: &str = r##"The repository in /workspace/{{ workspace_dir_name }} has the following issue:

{{ issue_description }}

Find the root cause and change the implementation so the issue is resolved. Keep the change minimal."##;

pub const REPRODUCE_ISSUE_OPENHANDS: &str = r##"The repository in /workspace/{{ workspace_dir_name }} has the following issue:

{{ issue_description }}

Do not fix it. Write a new test file under tests/ that reproduces the issue: it must fail on the current code and pass once the issue is fixed."##;

pub const FINISH_FULL_OPENHANDS: &str = r##"The repository in /workspace/{{ workspace_dir_name }} contains a project whose implementation bodies are empty. Read tasks.md and the tests under tests/, then implement the whole project so that every test passes. Do not modify the tests."##;

pub const FIX_DOCKERFILE_OPENHANDS: &str = r##"Building the Dockerfile in this repository failed.

{{ error_msgs }}

Fix the Dockerfile (and only what the build needs) so that `docker build .` succeeds."##;
