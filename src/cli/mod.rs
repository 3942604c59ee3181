//! Operator commands

pub mod commands;
