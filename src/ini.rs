//! Lossless reader/writer for the sectioned `key = value` files used by the AWS tooling.
//!
//! Every line keeps its original text and line ending, so rendering a parsed document
//! reproduces the input byte for byte. Only values changed through [`Section::set`] are
//! re-rendered, and they keep the spacing around the `=` of the original line.

use std::fmt;
use std::mem;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Document {
    sections: Vec<Section>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Section {
    name: Option<String>,
    header: Option<Line>,
    lines: Vec<Line>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Line {
    content: Content,
    eol: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Content {
    Verbatim(String),
    Entry(Entry),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    key: String,
    // everything before the value, including the key, the `=` and surrounding blanks
    lead: String,
    value: String,
    trail: String,
}

impl Document {
    pub(crate) fn parse(text: &str) -> Self {
        let mut sections = Vec::new();
        // keys that appear before the first header live in an unnamed section
        let mut current = Section {
            name: None,
            header: None,
            lines: Vec::new(),
        };
        for raw in text.split_inclusive('\n') {
            let (body, eol) = split_eol(raw);
            if let Some(name) = header_name(body) {
                let next = Section {
                    name: Some(name.to_owned()),
                    header: Some(Line::verbatim(body, eol)),
                    lines: Vec::new(),
                };
                sections.push(mem::replace(&mut current, next));
                continue;
            }
            let content = match Entry::parse(body) {
                Some(entry) => Content::Entry(entry),
                None => Content::Verbatim(body.to_owned()),
            };
            current.lines.push(Line {
                content,
                eol: eol.to_owned(),
            });
        }
        sections.push(current);
        Self { sections }
    }

    pub(crate) fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub(crate) fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.sections.iter_mut()
    }

    pub(crate) fn section(&self, name: &str) -> Option<&Section> {
        self.sections().find(|section| section.name() == Some(name))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            if let Some(header) = &section.header {
                write!(f, "{header}")?;
            }
            for line in &section.lines {
                write!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

impl Section {
    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Value of the first entry named `key`.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match &line.content {
            Content::Entry(entry) if entry.key == key => Some(entry.value.as_str()),
            _ => None,
        })
    }

    /// Overwrites the first entry named `key`, or appends a new entry after the last one.
    pub(crate) fn set(&mut self, key: &str, value: &str) {
        let existing = self.lines.iter_mut().find_map(|line| match &mut line.content {
            Content::Entry(entry) if entry.key == key => Some(entry),
            _ => None,
        });
        if let Some(entry) = existing {
            entry.value = value.to_owned();
            return;
        }

        let index = self
            .lines
            .iter()
            .rposition(|line| matches!(line.content, Content::Entry(_)))
            .map_or(0, |index| index + 1);
        let previous = match index.checked_sub(1) {
            Some(previous) => Some(&mut self.lines[previous]),
            None => self.header.as_mut(),
        };
        let eol = match previous {
            // the new entry becomes the last line of the file
            Some(previous) if previous.eol.is_empty() => {
                previous.eol = "\n".to_owned();
                String::new()
            }
            Some(previous) => previous.eol.clone(),
            None => "\n".to_owned(),
        };
        self.lines.insert(
            index,
            Line {
                content: Content::Entry(Entry {
                    key: key.to_owned(),
                    lead: format!("{key} = "),
                    value: value.to_owned(),
                    trail: String::new(),
                }),
                eol,
            },
        );
    }
}

impl Line {
    fn verbatim(body: &str, eol: &str) -> Self {
        Self {
            content: Content::Verbatim(body.to_owned()),
            eol: eol.to_owned(),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Content::Verbatim(text) => write!(f, "{text}{}", self.eol),
            Content::Entry(entry) => write!(
                f,
                "{}{}{}{}",
                entry.lead, entry.value, entry.trail, self.eol
            ),
        }
    }
}

impl Entry {
    fn parse(body: &str) -> Option<Self> {
        let trimmed = body.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            return None;
        }
        let separator = body.find('=')?;
        let key = body[..separator].trim();
        if key.is_empty() {
            return None;
        }
        let rest = &body[separator + 1..];
        let value = rest.trim();
        let start = separator + 1 + (rest.len() - rest.trim_start().len());
        let end = start + value.len();
        Some(Self {
            key: key.to_owned(),
            lead: body[..start].to_owned(),
            value: value.to_owned(),
            trail: body[end..].to_owned(),
        })
    }
}

/// `[name]`, optionally followed by a `#` or `;` comment.
fn header_name(body: &str) -> Option<&str> {
    let inner = body.trim().strip_prefix('[')?;
    let close = inner.find(']')?;
    let rest = inner[close + 1..].trim_start();
    if rest.is_empty() || rest.starts_with('#') || rest.starts_with(';') {
        Some(inner[..close].trim())
    } else {
        None
    }
}

fn split_eol(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSY: &str = "# managed by hand\r\n\
        region=us-east-1\r\n\
        \r\n\
        [default]\r\n\
        aws_access_key_id = AKIAOLD   \r\n\
        ; comment = not a key\r\n\
        aws_secret_access_key=secretOld\r\n\
        \r\n\
        [ work ]\n\
        aws_access_key_id\t=\tAKIAWORK\n\
        dangling line without separator\n\
        empty_value =\n\
        token = a=b=c";

    #[test]
    fn test_render_is_lossless() {
        assert_eq!(Document::parse(MESSY).to_string(), MESSY);
        assert_eq!(Document::parse("").to_string(), "");
    }

    #[test]
    fn test_sections_and_values() {
        let document = Document::parse(MESSY);
        let names = document
            .sections()
            .map(|section| section.name())
            .collect::<Vec<_>>();
        assert_eq!(names, [None, Some("default"), Some("work")]);

        let leading = document.sections().next().unwrap();
        assert_eq!(leading.get("region"), Some("us-east-1"));

        let default = document.section("default").unwrap();
        assert_eq!(default.get("aws_access_key_id"), Some("AKIAOLD"));
        assert_eq!(default.get("aws_secret_access_key"), Some("secretOld"));
        assert_eq!(default.get("; comment"), None);

        let work = document.section("work").unwrap();
        assert_eq!(work.get("aws_access_key_id"), Some("AKIAWORK"));
        assert_eq!(work.get("empty_value"), Some(""));
        assert_eq!(work.get("token"), Some("a=b=c"));
        assert_eq!(work.get("AWS_ACCESS_KEY_ID"), None);
    }

    #[test]
    fn test_set_keeps_layout() {
        let mut document = Document::parse(MESSY);
        let section = document
            .sections_mut()
            .find(|section| section.name() == Some("default"))
            .unwrap();
        section.set("aws_access_key_id", "AKIANEW");
        section.set("aws_secret_access_key", "secretNew");

        let expected = MESSY
            .replace("AKIAOLD", "AKIANEW")
            .replace("secretOld", "secretNew");
        assert_eq!(document.to_string(), expected);
    }

    #[test]
    fn test_set_inserts_missing_key() {
        let mut document = Document::parse("[default]\naws_access_key_id = A\n\n[other]\nx = 1");
        for section in document.sections_mut() {
            match section.name() {
                Some("default") => section.set("aws_secret_access_key", "S"),
                Some("other") => section.set("y", "2"),
                _ => {}
            }
        }
        assert_eq!(
            document.to_string(),
            "[default]\naws_access_key_id = A\naws_secret_access_key = S\n\n[other]\nx = 1\ny = 2",
        );
    }

    #[test]
    fn test_header_with_comment() {
        let text = "[a]\naws_access_key_id = AKIAA\n\n[b] # main account\naws_access_key_id = AKIAOLD\n[c];old\nx = 1\n[d] trailing\ny = 2\n";
        let document = Document::parse(text);
        let names = document
            .sections()
            .map(|section| section.name())
            .collect::<Vec<_>>();
        assert_eq!(names, [None, Some("a"), Some("b"), Some("c")]);
        assert_eq!(
            document.section("b").unwrap().get("aws_access_key_id"),
            Some("AKIAOLD"),
        );
        // not a header, so its lines stay in `c`
        assert_eq!(document.section("c").unwrap().get("y"), Some("2"));
        assert_eq!(document.to_string(), text);
    }

    #[test]
    fn test_set_after_bare_header() {
        let mut document = Document::parse("[default]");
        for section in document.sections_mut() {
            if section.name() == Some("default") {
                section.set("a", "1");
            }
        }
        assert_eq!(document.to_string(), "[default]\na = 1");
    }
}
