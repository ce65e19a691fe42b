//! Interactive completion of a configuration document
//!
//! The terminal itself lives behind `Prompter` so completion can be driven
//! by scripted answers in tests.

use crate::document::{ConfigDocument, ConfigKey};
use crate::error::{ConfigError, Result};

/// Source of answers for missing settings
pub trait Prompter {
    /// Ask for a value. An empty answer means "accept the default" (if any).
    fn prompt(&mut self, label: &str, default: Option<&str>) -> std::io::Result<String>;
}

/// Prompt for every missing key, in `ConfigKey::PROMPTED` order.
///
/// Returns `true` when the document was changed.
pub fn complete(doc: &mut ConfigDocument, prompter: &mut dyn Prompter) -> Result<bool> {
    let mut changed = false;

    for key in ConfigKey::PROMPTED {
        if doc.get(key).is_some() {
            continue;
        }

        let default = doc.default_for(key);
        let answer = prompter.prompt(key.label(), default.as_deref())?;
        let answer = answer.trim();

        if !answer.is_empty() {
            doc.set(key, answer);
            changed = true;
        } else if let Some(default) = default {
            doc.set(key, default);
            changed = true;
        } else if key.is_required() {
            return Err(ConfigError::MissingRequired(key.path()));
        } else {
            tracing::debug!(key = key.path(), "optional setting left unset");
        }
    }

    Ok(changed)
}
