pub mod asset;
pub mod generation;
pub mod history;
pub mod ids;
pub mod job;
pub mod slot;

pub use asset::*;
pub use generation::*;
pub use history::*;
pub use ids::*;
pub use job::*;
pub use slot::*;
