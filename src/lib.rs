pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod output;
pub mod producer;
pub mod replay;
pub mod run_loop;
pub mod selector;
pub mod simulator;
pub mod types;
pub mod voice;
