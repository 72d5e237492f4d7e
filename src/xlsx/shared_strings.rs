//! Shared strings table for string deduplication

use super::xml_writer::XmlWriter;
use crate::error::Result;
use indexmap::IndexSet;
use std::io::Write;

/// Append-only string pool; an entry's index is its insertion order
#[derive(Debug, Default)]
pub struct SharedStrings {
    strings: IndexSet<String>,
    references: usize,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value` and return its index. Line endings fold to `\n`.
    pub fn intern(&mut self, value: &str) -> u32 {
        self.references += 1;
        let normalized = normalize_newlines(value);
        if let Some(index) = self.strings.get_index_of(normalized.as_str()) {
            return index as u32;
        }
        self.strings.insert_full(normalized).0 as u32
    }

    /// Number of unique strings
    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    /// Number of cells referencing the table
    pub fn reference_count(&self) -> usize {
        self.references
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get_index(index as usize).map(String::as_str)
    }

    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.references)?;
        writer.attribute_int("uniqueCount", self.strings.len())?;
        writer.close_start_tag()?;

        for s in &self.strings {
            writer.start_element("si")?;
            writer.close_start_tag()?;

            writer.start_element("t")?;
            if needs_space_preserve(s) {
                writer.attribute("xml:space", "preserve")?;
            }
            writer.close_start_tag()?;
            writer.write_escaped(s)?;
            writer.end_element("t")?;

            writer.end_element("si")?;
        }

        writer.end_element("sst")?;
        writer.flush()
    }
}

fn normalize_newlines(value: &str) -> String {
    if value.contains('\r') {
        value.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        value.to_string()
    }
}

fn needs_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::xml_writer::render;

    #[test]
    fn test_shared_strings() {
        let mut ss = SharedStrings::new();

        let idx1 = ss.intern("Hello");
        let idx2 = ss.intern("World");
        let idx3 = ss.intern("Hello");

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(ss.unique_count(), 2);
        assert_eq!(ss.reference_count(), 3);
    }

    #[test]
    fn test_line_endings_fold() {
        let mut ss = SharedStrings::new();
        let crlf = ss.intern("a\r\nb");
        let lf = ss.intern("a\nb");
        let cr = ss.intern("a\rb");
        assert_eq!(crlf, lf);
        assert_eq!(cr, lf);
        assert_eq!(ss.get(lf), Some("a\nb"));
    }

    #[test]
    fn test_xml_output() {
        let mut ss = SharedStrings::new();
        ss.intern(" padded");
        ss.intern("a & b");
        ss.intern("a & b");

        let xml = String::from_utf8(render(|w| ss.write_xml(w)).unwrap()).unwrap();
        assert!(xml.contains("count=\"3\" uniqueCount=\"2\""));
        assert!(xml.contains("<si><t xml:space=\"preserve\"> padded</t></si>"));
        assert!(xml.contains("<si><t>a &amp; b</t></si>"));
    }
}
