//! API models

pub mod gemini;
pub mod github;

pub use gemini::{Candidate, Content, GenerateContentRequest, GenerateContentResponse, Part};
pub use github::{HeadCommit, Job, JobList, Step, WorkflowRun, WorkflowRunList};
