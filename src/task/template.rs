// src/task/template.rs

//! Strict run-template renderer.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` are literal braces.
//! Parsing happens once, up front, so a malformed template is a
//! configuration error. Rendering checks every placeholder before producing
//! any output, so a task never gets a half-formatted command.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static template regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references '{{{0}}}' but the task does not provide it")]
    MissingParameter(String),

    #[error("malformed template '{template}': {reason}")]
    Malformed { template: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed run template such as `./{executable} -i {instance_path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in TOKEN.captures_iter(source) {
            let whole = caps.get(0).expect("capture 0 always present");
            push_literal(source, &source[last..whole.start()], &mut literal)?;
            last = whole.end();

            match caps.get(1) {
                Some(name) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.as_str().to_string()));
                }
                None => literal.push_str(&whole.as_str()[..1]),
            }
        }

        push_literal(source, &source[last..], &mut literal)?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Placeholder(name) = seg {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder from `values`.
    ///
    /// Fails on the first placeholder that has no value; extra values that the
    /// template does not mention are ignored.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !values.contains_key(*name))
        {
            return Err(TemplateError::MissingParameter(missing.to_string()));
        }

        let mut out = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(&values[name]),
            }
        }
        Ok(out)
    }
}

fn push_literal(template: &str, text: &str, literal: &mut String) -> Result<(), TemplateError> {
    if let Some(pos) = text.find(['{', '}']) {
        let reason = match &text[pos..pos + 1] {
            "{" => "unclosed or invalid placeholder",
            _ => "single '}' outside a placeholder",
        };
        return Err(TemplateError::Malformed {
            template: template.to_string(),
            reason: reason.to_string(),
        });
    }
    literal.push_str(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_named_placeholders() {
        let tpl = CommandTemplate::parse("./{executable} -i {instance_path}").unwrap();
        let cmd = tpl
            .render(&values(&[("executable", "solver"), ("instance_path", "a.txt")]))
            .unwrap();
        assert_eq!(cmd, "./solver -i a.txt");
    }

    #[test]
    fn missing_parameter_fails_without_partial_output() {
        let tpl =
            CommandTemplate::parse("{executable} -i {instance_path} --depth {depth}").unwrap();
        let err = tpl
            .render(&values(&[("executable", "s"), ("instance_path", "i")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingParameter("depth".to_string()));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let tpl = CommandTemplate::parse("awk '{{print $1}}' {instance_path}").unwrap();
        assert_eq!(tpl.placeholders(), vec!["instance_path"]);
        let cmd = tpl.render(&values(&[("instance_path", "x")])).unwrap();
        assert_eq!(cmd, "awk '{print $1}' x");
    }

    #[test]
    fn unclosed_placeholder_is_malformed() {
        assert!(matches!(
            CommandTemplate::parse("./{executable {instance_path}"),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            CommandTemplate::parse("./run }"),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn repeated_placeholders_are_listed_once() {
        let tpl = CommandTemplate::parse("{a} {b} {a}").unwrap();
        assert_eq!(tpl.placeholders(), vec!["a", "b"]);
    }
}
