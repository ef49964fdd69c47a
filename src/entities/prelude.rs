#![allow(unused_imports)]

pub use super::project_stats::Entity as ProjectStats;
pub use super::submission::Entity as Submission;
