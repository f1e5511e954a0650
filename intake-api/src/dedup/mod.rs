pub mod coordinator;
pub mod ranker;
pub mod search;
pub mod tracker;

pub use coordinator::{SearchCoordinator, SearchOutcome};
pub use ranker::MatchRanker;
pub use search::{CandidateSearch, DuplicateSearchReport, StrategyKind, StrategyOutcome};
pub use tracker::{DispositionTracker, MergeWait, PollSettings};
