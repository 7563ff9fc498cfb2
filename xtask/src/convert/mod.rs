//! ELF conversion utilities.
//!
//! Helpers to lay linked guest firmware out into the flat flash images the
//! machine model loads at realize time.

pub mod elf;
