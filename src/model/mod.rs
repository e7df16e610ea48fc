//! Record types shared by the loader, the indexer and the aggregators.

pub mod types;

pub use types::{Commit, CommitAuthor, HeadCommit, Job, Run};
