pub mod aws;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod login;
pub mod output;
pub mod prompt;
