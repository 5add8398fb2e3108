//! Configuration module for httpeat
//!
//! This module handles loading, parsing, and validating configuration, from
//! a TOML file and from the list entries (mirrors, proxies) it carries.
//!
//! # Example
//!
//! ```no_run
//! use httpeat::config::load_and_validate;
//! use std::path::Path;
//!
//! let config = load_and_validate(Path::new("httpeat.toml")).unwrap();
//! println!("Harvesting {} targets", config.target_urls.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ProxyLane, RETRY_DL_NETWORKERROR_DEFAULT, RETRY_GLOBAL_ERROR_DEFAULT,
    RETRY_INDEX_NETWORKERROR_DEFAULT, TASKS_DEFAULT, TIMEOUT_DEFAULT,
};

// Re-export parser functions
pub use parser::{load_and_validate, load_config, parse_mirrors, parse_proxies, read_list_file};
pub use validation::{validate, validate_proxies};
