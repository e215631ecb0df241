pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod normalize;
pub mod priority;
pub mod repo;
pub mod store;
pub mod submit;
pub mod validate;
pub mod workflow;
