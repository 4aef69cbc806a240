//! The `version` command

use packsmith::error::Result;

pub fn run() -> Result<()> {
    println!("packsmith {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
