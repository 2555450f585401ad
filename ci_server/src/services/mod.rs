//! CI services — webhook verification, command execution, build steps and history.

pub mod build_service;
pub mod command;
pub mod github_service;
pub mod orchestrator;
pub mod step_executor;
pub mod workspace;
