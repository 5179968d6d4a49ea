use std::error::Error;

pub mod config;
pub mod extract;
pub mod memory;
pub mod model;
pub mod notes;
pub mod parser;
pub mod pipeline;
pub mod router;

/// Flatten an error chain into one line for console reporting.
pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
