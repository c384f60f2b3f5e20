//! Checkpointed, retry-bounded task rollout.
//!
//! Tasks are processed strictly in index order. Each accepted task's
//! implementation checkpoint is the input of the next task, and the
//! cumulative test set (newest task first) must pass on every accepted
//! checkpoint.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use swe_playground::rollout::{RolloutMachine, RuntimeLayout, ScriptTestExecutor};
//!
//! let layout = RuntimeLayout::create(Path::new("runtimes"), project.name())?;
//! let machine = RolloutMachine::new(agent, Arc::new(ScriptTestExecutor::new()), prompts);
//! let report = machine.run(Path::new("generated/calc"), &layout).await?;
//! ```

pub mod checkpoint;
pub mod executor;
pub mod machine;
pub mod retry;
pub mod tamper;

pub use checkpoint::{
    copy_tree, proposal_doc, read_test_prompt, remove_tree, replace_tree, runner_script,
    test_module, RuntimeLayout, Stage, CONVERTED_DIR, TESTS_DIR,
};
pub use executor::{discover_suite, ScriptTestExecutor, TestExecutor, TestOutcome};
pub use machine::{RolloutMachine, RolloutReport, DEFAULT_MAX_ATTEMPTS};
pub use retry::{Attempt, BoundedRetry, OnExhaustion, RetryOutcome};
pub use tamper::{check_and_repair, find_tampered};
