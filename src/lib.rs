//! Account lifecycle for local developer accounts on Linux (shadow-utils) and
//! macOS (directory services)
pub mod commands;
pub mod macros;
pub mod utils;
