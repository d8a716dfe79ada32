pub mod cli;
pub mod common;
pub mod manifest;

pub use cli::{
    BatchCommands, CandidatesCommands, Cli, Commands, MapsCommands, OptimizeArgs, ScenarioArgs,
    ScenariosCommands,
};
