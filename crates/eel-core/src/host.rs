//! Seams to the embedding host: named-variable lookup and text output.

use std::collections::HashMap;

/// Named script variables, as bound by the host's compiler.
///
/// Used for `%{name}` redirection in both the formatter and the matcher.
pub trait Variables {
    fn get(&self, name: &str) -> Option<f64>;

    /// Store a value; returns false if the host has no such variable.
    fn set(&mut self, name: &str, value: f64) -> bool;
}

/// A host with no named variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoVariables;

impl Variables for NoVariables {
    fn get(&self, _name: &str) -> Option<f64> {
        None
    }

    fn set(&mut self, _name: &str, _value: f64) -> bool {
        false
    }
}

impl Variables for HashMap<String, f64> {
    fn get(&self, name: &str) -> Option<f64> {
        HashMap::get(self, name).copied()
    }

    fn set(&mut self, name: &str, value: f64) -> bool {
        self.insert(name.to_string(), value);
        true
    }
}

/// Destination of `printf` output.
pub trait OutputSink {
    fn write_bytes(&mut self, bytes: &[u8]);
}

impl OutputSink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}
