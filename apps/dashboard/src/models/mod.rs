pub mod jobs;
pub mod processing;
pub mod profile;
