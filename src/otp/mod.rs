pub mod repo;
pub mod repo_types;
pub mod services;
pub mod sweeper;
