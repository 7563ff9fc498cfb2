use clap::Parser;
use xtask::convert::elf::elf_to_flash_image;
use xtask::generate::boot::write_boot_rom;
use xtask::{Cli, Command};

/// Main function for the xtask utility.
fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::GenImage { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("img"));
            elf_to_flash_image(&input, &output)
        }
        Command::DumpBootRom { output } => write_boot_rom(&output),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
