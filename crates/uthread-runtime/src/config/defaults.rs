//! Compile-time defaults
//!
//! Generated by `build.rs` from the library defaults, optionally merged with
//! the file named by `UTH_CONFIG_RS`.

include!(concat!(env!("OUT_DIR"), "/uth_merged_config.rs"));
