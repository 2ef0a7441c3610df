//! Note fragment parsing
//!
//! A note is a YAML mapping from section name to either a single string or
//! a list of strings. The prelude section holds one string. Section order
//! is preserved as written.

use serde_yaml::Value;

use crate::error::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Note {
    /// Sections in file order; single strings are promoted to one-item lists
    pub sections: Vec<(String, Vec<String>)>,
    /// Content problems that did not prevent parsing
    pub warnings: Vec<String>,
}

impl Note {
    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, items)| items.as_slice())
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }
}

pub fn parse_note(path: &str, content: &[u8], prelude_name: &str) -> Result<Note, Diagnostic> {
    let malformed = |reason: String| Diagnostic::MalformedFragment { path: path.to_string(), reason };

    let text = std::str::from_utf8(content).map_err(|e| malformed(format!("not valid UTF-8: {e}")))?;
    let value: Value = serde_yaml::from_str(text).map_err(|e| malformed(format!("invalid YAML: {e}")))?;
    let Value::Mapping(map) = value else {
        return Err(malformed(
            "does not appear to be structured as a YAML mapping; did you forget a top-level key?"
                .to_string(),
        ));
    };

    let mut note = Note::default();
    for (key, body) in map {
        let Some(name) = key.as_str().map(str::to_string) else {
            note.warnings.push(format!("ignoring non-string section name {key:?}"));
            continue;
        };

        if name == prelude_name {
            match body {
                Value::String(s) => note.sections.push((name, vec![s])),
                other => note.warnings.push(format!(
                    "the {name} section does not parse as a single string ({})",
                    kind(&other)
                )),
            }
            continue;
        }

        let items = match body {
            Value::String(s) => vec![s],
            Value::Sequence(seq) => {
                let mut items = Vec::with_capacity(seq.len());
                for item in seq {
                    match item {
                        Value::String(s) => items.push(s),
                        other => note.warnings.push(format!(
                            "an item in the {name} section parses as {} instead of a string",
                            kind(&other)
                        )),
                    }
                }
                items
            }
            other => {
                note.warnings.push(format!(
                    "the {name} section does not parse as a string or list of strings ({})",
                    kind(&other)
                ));
                continue;
            }
        };
        note.sections.push((name, items));
    }
    Ok(note)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
