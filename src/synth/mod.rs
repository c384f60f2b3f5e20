//! Benchmark variants derived from an accepted rollout.
//!
//! - [`VariantSynthesizer`] with [`VariantKind::Fix`] injects a defect that
//!   breaks a task's tests and asks the agent to repair it from a bug
//!   report alone.
//! - [`VariantSynthesizer`] with [`VariantKind::Reproduce`] injects a defect
//!   the suite does not catch and asks the agent for a failing test.
//! - [`Commit0Builder`] asks the agent to complete the whole repository
//!   against the final test suite.

pub mod cleanup;
pub mod commit0;
pub mod issue;
pub mod variant;

pub use cleanup::{clean_title, cleanup_test_files, strip_placeholders, RenameStyle, SOURCE_DIR};
pub use commit0::{iteration_key, Commit0Builder, Commit0Report, RAW_DIR};
pub use issue::{IssueProposal, IssueProposer};
pub use variant::{VariantKind, VariantReport, VariantSynthesizer, DEFAULT_VARIANT_ATTEMPTS};
