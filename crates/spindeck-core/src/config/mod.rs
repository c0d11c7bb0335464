//! Configuration loading and saving

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, PlayerConfig};
