pub mod cache;
pub mod commands;
pub mod companion;
pub mod core;
pub mod fs_utils;
pub mod install;
pub mod library;
pub mod presets;
