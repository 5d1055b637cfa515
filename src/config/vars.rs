//! Environment references in config files.
//!
//! Credentials usually stay out of the YAML file. Before parsing, `$PGUSER`,
//! `${PGUSER}` and `${PGHOST:-localhost}` are replaced with the variable's
//! value (or the fallback when it is unset or empty); `$$` is a literal `$`.

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<dollar>\$)|\{(?P<braced>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<fallback>[^}]*))?\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*))",
    )
    .expect("reference pattern compiles")
});

/// Replace references in `input` with values from the process environment.
///
/// Every unresolved reference is listed in the error, one per line.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    interpolate_with(input, |name| env::var(name).ok())
}

/// Same as [`interpolate`] with an explicit variable lookup.
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut unresolved = Vec::new();
    let text = REFERENCE.replace_all(input, |caps: &Captures| {
        resolve(caps, &lookup).unwrap_or_else(|problem| {
            unresolved.push(problem);
            caps[0].to_string()
        })
    });

    if unresolved.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(unresolved)
    }
}

fn resolve<F>(caps: &Captures, lookup: &F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    if caps.name("dollar").is_some() {
        return Ok("$".to_string());
    }
    let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
        return Ok(caps[0].to_string());
    };
    let name = name.as_str();

    match (lookup(name), caps.name("fallback")) {
        (Some(value), _) if value.contains(['\n', '\r']) => {
            // a multi-line value could smuggle extra YAML keys in
            Err(format!("${name} holds a multi-line value"))
        }
        (Some(value), Some(fallback)) if value.is_empty() => Ok(fallback.as_str().to_string()),
        (Some(value), _) => Ok(value),
        (None, Some(fallback)) => Ok(fallback.as_str().to_string()),
        (None, None) => Err(format!("${name} is referenced but not set")),
    }
}
