pub mod providers;
pub mod ranking;
pub mod recommendations;
pub mod search;

pub use providers::{JobBoardProvider, SearchProvider};
pub use ranking::KeywordProfile;
pub use recommendations::{
    PartialFailure, RecommendOptions, Recommendation, RecommendationEngine,
};
