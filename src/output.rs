//! Diagnostic sink for incidental output.
//!
//! Whatever a handler writes outside its return value lands here instead of
//! in the response body. In test mode the collected messages are surfaced in
//! the `output` meta field of every rendered body.

use serde_json::Value;

/// Per-request buffer of incidental writes.
#[derive(Debug, Default)]
pub struct Output {
    messages: Vec<String>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one incidental write. Empty writes are ignored.
    pub fn write(&mut self, contents: impl Into<String>) {
        let contents = contents.into();
        if contents.is_empty() {
            return;
        }
        tracing::debug!(%contents, "captured handler output");
        self.messages.push(contents);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The messages as a JSON array.
    pub fn to_value(&self) -> Value {
        Value::from(self.messages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_non_empty_writes_in_order() {
        let mut out = Output::new();
        out.write("first");
        out.write("");
        out.write(String::from("second"));
        assert_eq!(out.messages(), ["first", "second"]);
        assert_eq!(out.to_value(), serde_json::json!(["first", "second"]));
    }
}
