//! Pure extraction functions over a `ProfileBundle`. None of these touch the
//! network or a clock beyond reading `Utc::now()` for relative-time math —
//! given the same bundle and dictionary, they always return the same output.

pub mod activity;
pub mod dictionary;
pub mod network;
pub mod reachability;
pub mod seniority;
pub mod skills;

pub use activity::ActivityOutput;
pub use dictionary::Dictionary;
pub use network::NetworkOutput;
pub use reachability::ReachabilityOutput;
pub use seniority::SeniorityOutput;
pub use skills::SkillsOutput;
