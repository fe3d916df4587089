//! Error translation.
//!
//! An [`ErrorTranslator`] decides how a failure is presented: the status it
//! maps to, what it adds to the meta section, and the body content. The
//! kernel resolves one by name at startup from a [`Translators`] table, so a
//! deployment can swap presentation without touching the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::Error;

/// Maps a failure onto `(status, meta, content)`.
pub trait ErrorTranslator: Send + Sync {
    fn status(&self, error: &Error, meta: &Map<String, Value>) -> u16;

    /// `meta` is the meta section built so far; return it extended.
    fn meta(&self, error: &Error, meta: Map<String, Value>) -> Map<String, Value>;

    fn content(&self, error: &Error, meta: &Map<String, Value>) -> Value;
}

/// The stock policy.
///
/// Taxonomy errors keep their declared status, anything else gets `fail`.
/// Meta gains an `error` entry with kind, message, and source chain; the
/// content is the kind and message only.
#[derive(Clone, Copy, Debug)]
pub struct DefaultTranslator {
    fail: u16,
}

impl DefaultTranslator {
    pub fn new(fail: u16) -> Self {
        Self { fail }
    }
}

impl ErrorTranslator for DefaultTranslator {
    fn status(&self, error: &Error, _meta: &Map<String, Value>) -> u16 {
        error.status().unwrap_or(self.fail)
    }

    fn meta(&self, error: &Error, mut meta: Map<String, Value>) -> Map<String, Value> {
        meta.extend(error_format(error));
        meta
    }

    fn content(&self, error: &Error, _meta: &Map<String, Value>) -> Value {
        json!({
            "kind": error.kind().as_str(),
            "message": error.to_string(),
        })
    }
}

/// Diagnostic rendering of `error` for the meta section.
pub fn error_format(error: &Error) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("error".to_owned(), json!({
        "kind": error.kind().as_str(),
        "message": error.to_string(),
        "trace": error.chain(),
    }));
    out
}

/// Named translators, resolved once when the kernel is built.
#[derive(Clone)]
pub struct Translators {
    by_name: HashMap<String, Arc<dyn ErrorTranslator>>,
}

impl Translators {
    /// A table holding only `"default"`.
    pub fn new(fail: u16) -> Self {
        let mut by_name: HashMap<String, Arc<dyn ErrorTranslator>> = HashMap::new();
        by_name.insert("default".to_owned(), Arc::new(DefaultTranslator::new(fail)));
        Self { by_name }
    }

    /// Registers or replaces `name`.
    pub fn register(&mut self, name: &str, translator: Arc<dyn ErrorTranslator>) {
        self.by_name.insert(name.to_owned(), translator);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ErrorTranslator>, Error> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("no error translator named `{name}`")))
    }
}
