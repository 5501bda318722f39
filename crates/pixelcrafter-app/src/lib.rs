//! PixelCrafter command-line front end.
//!
//! Drives [`pixelcrafter_core::Editor`] against a backend without a window:
//! every subcommand restores the session, opens a project if it needs one,
//! applies its edit and flushes the resulting saves.

pub mod cli;
pub mod format;
