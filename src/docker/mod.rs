//! Container image build and publication for generated projects.
//!
//! [`ImageBuilder`] runs `docker build` in the project directory; when a
//! build fails, the tail of its output goes to the coding agent with the
//! dockerfile-fix prompt and the build is retried, up to five builds in
//! total. A successful image is pushed and then removed locally.

pub mod backend;
pub mod builder;

pub use backend::{BuildOutput, DockerCli, ImageBackend};
pub use builder::{error_summary, image_tag, ImageBuilder, DEFAULT_BUILD_ATTEMPTS, ERROR_TAIL_CHARS};
