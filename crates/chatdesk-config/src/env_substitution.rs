use chatdesk_core::{ChatdeskError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::env;

// Supports both ${VAR} and ${VAR:-default}
static ENV_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Recursively substitute environment variables in every string of a parsed
/// configuration document.
pub fn substitute_env_vars(value: &mut Value) -> Result<()> {
    substitute_with(value, &|name: &str| env::var(name).ok())
}

pub(crate) fn substitute_with(
    value: &mut Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<()> {
    match value {
        Value::String(s) => {
            *s = substitute_in_string(s, lookup)?;
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_with(v, lookup)?;
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                substitute_with(v, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_in_string(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let mut missing_vars = Vec::new();

    let output = ENV_VAR_REGEX.replace_all(input, |caps: &Captures<'_>| {
        let var_name = &caps[1];
        match (lookup(var_name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing_vars.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !missing_vars.is_empty() {
        return Err(ChatdeskError::Config(format!(
            "Missing required environment variables: {}. Please set these variables before loading the configuration.",
            missing_vars.join(", ")
        )));
    }

    Ok(output.into_owned())
}
