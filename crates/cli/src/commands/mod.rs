//! Command handlers for the pitchsim CLI.

pub mod knowledge;

pub use knowledge::KnowledgeCommand;
