//! Template expansion for configuration strings.
//!
//! Configuration values such as `staging_directory` may reference build
//! user variables. The expansion itself is a collaborator behind the
//! [`TemplateEngine`] trait; [`JinjaTemplateEngine`] is the bundled
//! implementation built on `minijinja`.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use minijinja::{Environment, ErrorKind, UndefinedBehavior, context};

/// Expands a template string against a set of user variables.
pub trait TemplateEngine: Send + Sync {
    fn expand(&self, template: &str, vars: &BTreeMap<String, String>) -> Result<String>;
}

/// `minijinja`-based template engine.
///
/// Supported functions:
/// - `user("name")`: value of a user variable; an unknown name is an error
/// - `timestamp()`: UNIX time in seconds, fixed per engine instance
/// - `uuid()`: a random v4 UUID
///
/// Undefined variables are errors rather than empty strings.
#[derive(Debug, Clone)]
pub struct JinjaTemplateEngine {
    timestamp: u64,
}

impl JinjaTemplateEngine {
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { timestamp }
    }

    /// Creates an engine whose `timestamp()` always returns `timestamp`.
    pub fn with_timestamp(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

impl Default for JinjaTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaTemplateEngine {
    fn expand(&self, template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        // Plain strings skip the engine entirely.
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        let user_vars = vars.clone();
        env.add_function("user", move |name: &str| -> Result<String, minijinja::Error> {
            user_vars.get(name).cloned().ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::UndefinedError,
                    format!("unknown user variable: {}", name),
                )
            })
        });
        let timestamp = self.timestamp;
        env.add_function("timestamp", move || timestamp.to_string());
        env.add_function("uuid", || uuid::Uuid::new_v4().to_string());

        let rendered = env.render_str(template, context! {})?;
        Ok(rendered)
    }
}
