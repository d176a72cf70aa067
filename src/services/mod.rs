pub mod dependencies;
pub mod embedded;
pub mod job;
pub mod metadata;
pub mod pipeline;
pub mod runner;
