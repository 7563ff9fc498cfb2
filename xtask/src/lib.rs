//! Arduino Uno Rev4 image utilities.
//!
//! Host-side tooling for the emulated board: converts linked guest ELF
//! firmware into the flat flash images the machine consumes, and dumps the
//! default boot ROM for inspection.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod convert;
pub mod error;
pub mod generate;

/// CLI structure for the xtask utility.
#[derive(Parser, Debug)]
#[clap(name = "xtask", about = "Image utilities for the Arduino Uno Rev4 machine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands for the xtask utility.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a linked guest ELF into a flat flash image.
    ///
    /// Loadable sections land at their link addresses inside the 256 KiB
    /// code flash; anything linked outside that range is an error.
    ///
    /// ```text
    /// cargo xtask gen-image -i target/thumbv7em-none-eabi/release/firmware
    /// Output: target/thumbv7em-none-eabi/release/firmware.img
    /// ```
    #[command(name = "gen-image")]
    GenImage {
        /// Input ELF file path.
        #[arg(long = "input", short = 'i')]
        input: PathBuf,
        /// Output image file path (optional).
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
    },
    /// Write the machine's default boot ROM image to a file.
    #[command(name = "dump-boot-rom")]
    DumpBootRom {
        /// Output file path.
        #[arg(long = "output", short = 'o')]
        output: PathBuf,
    },
}
