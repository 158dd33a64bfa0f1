//! # mcp-demos
//!
//! Demo MCP servers and clients built on the workspace's protocol runtime.
//! [`basic`] and [`advanced`] define what the two demo servers offer;
//! [`console`] holds the terminal handlers the demo clients install, and
//! [`settings`] the command line and logging setup the binaries share.

pub mod advanced;
pub mod basic;
pub mod console;
pub mod settings;
