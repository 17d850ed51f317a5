pub mod config;
pub mod job;
pub mod product;
pub mod prompt;
pub mod result;
pub mod strategy;
pub mod summary;
