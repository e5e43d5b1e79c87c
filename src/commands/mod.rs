// ABOUTME: Command module aggregator for the kestrel CLI.
// ABOUTME: Re-exports run, stages, and deployers command handlers.

mod deployers;
mod run;
mod stages;

pub use deployers::deployers;
pub use run::run;
pub use stages::stages;

use std::env;
use std::path::Path;

use kestrel::config::Config;
use kestrel::error::Result;

/// Load an explicit plan, or discover one in the working directory.
pub(crate) fn load_plan(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}
