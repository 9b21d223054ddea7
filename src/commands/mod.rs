pub mod import;
pub mod query;

pub use import::handle_import;
pub use query::{handle_clear, handle_count, handle_search, handle_show};

use anyhow::{Context, Result};
use serde::Serialize;

/// Pretty JSON on stdout; logs go to stderr
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
