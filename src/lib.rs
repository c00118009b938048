pub mod config;
pub mod errors;
pub mod models;
pub mod persist;
pub mod player;
pub mod playout;
pub mod probe;
pub mod schedule;
pub mod utils;
