//! CLI module - argument parsing

mod args;

pub use args::{CleanArgs, Cli, Commands, EvaluateArgs, RoleArgs, RunArgs, TrainArgs};
