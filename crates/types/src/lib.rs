//! Shared data model for the developer intelligence pipeline.
//!
//! Every type the pipeline passes between components lives here as a named,
//! strongly typed struct or enum — never as a loosely typed JSON blob — so
//! that the invariants in the design are checkable at compile time and the
//! extractors can be pure functions over concrete inputs.

mod bundle;
mod candidate;
mod edge;
mod error;
mod record;
mod timeline;
mod token;

pub use bundle::{
    Event, EventKind, IssueAction, ProfileBundle, PullRequestAction, PushCommit, Repo, User,
};
pub use candidate::Candidate;
pub use edge::CollaborationEdge;
pub use error::{ConfigError, GitHubError, PersistError, PipelineError};
pub use record::{
    ActivityTrend, BestContactMethod, IntelligenceRecord, LanguageShare, ReachabilitySignal,
    ReachabilitySignalKind, SeniorityLevel, TopCollaborator,
};
pub use timeline::ActivityTimelinePoint;
pub use token::GithubToken;
