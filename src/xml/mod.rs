//! Streaming XML output.

pub mod outputs;

pub use outputs::{OutputTarget, XmlOutputs};

use std::io::Write;

use crate::error::{ExportError, Result};

const INDENT: &str = "\t";

/// Indentation-tracking writer for nested elements.
///
/// Elements are written as soon as they are opened; the writer only keeps the
/// stack of open tag names so that closes stay balanced.
pub struct XmlWriter<W: Write> {
    out: W,
    stack: Vec<String>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stack: Vec::new(),
        }
    }

    /// Write the `<?xml ...?>` prolog.
    pub fn declaration(&mut self) -> Result<()> {
        writeln!(self.out, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        Ok(())
    }

    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.indent()?;
        writeln!(self.out, "<!-- {} -->", text.replace("--", "- -"))?;
        Ok(())
    }

    /// Open an element that will receive children.
    pub fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.start_tag(tag, attrs)?;
        writeln!(self.out, ">")?;
        self.stack.push(tag.to_string());
        Ok(())
    }

    /// Write a self-closing element.
    pub fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.start_tag(tag, attrs)?;
        writeln!(self.out, "/>")?;
        Ok(())
    }

    /// Close the innermost open element.
    pub fn close(&mut self) -> Result<()> {
        let tag = self
            .stack
            .pop()
            .ok_or_else(|| ExportError::Xml("close without open element".to_string()))?;
        self.indent()?;
        writeln!(self.out, "</{}>", tag)?;
        Ok(())
    }

    /// Flush and return the inner writer. Fails if elements are still open.
    pub fn finish(mut self) -> Result<W> {
        if !self.stack.is_empty() {
            return Err(ExportError::Xml(format!(
                "unclosed elements: {}",
                self.stack.join(" > ")
            )));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    /// Close everything still open and flush, for abandoning a session.
    pub fn abort(mut self) -> Result<W> {
        while !self.stack.is_empty() {
            self.close()?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.indent()?;
        write!(self.out, "<{}", tag)?;
        for (name, value) in attrs {
            write!(self.out, " {}=\"{}\"", name, escape(value))?;
        }
        Ok(())
    }

    fn indent(&mut self) -> Result<()> {
        for _ in 0..self.stack.len() {
            self.out.write_all(INDENT.as_bytes())?;
        }
        Ok(())
    }
}

/// Escape text for use inside a double-quoted attribute.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements() {
        let mut xml = XmlWriter::new(Vec::new());
        xml.open("scene", &[("version", "0.5.0")]).unwrap();
        xml.open("bsdf", &[("type", "diffuse"), ("id", "red")]).unwrap();
        xml.empty("rgb", &[("name", "reflectance"), ("value", "1 0 0")]).unwrap();
        xml.close().unwrap();
        xml.close().unwrap();
        let text = String::from_utf8(xml.finish().unwrap()).unwrap();

        assert_eq!(
            text,
            "<scene version=\"0.5.0\">\n\
             \t<bsdf type=\"diffuse\" id=\"red\">\n\
             \t\t<rgb name=\"reflectance\" value=\"1 0 0\"/>\n\
             \t</bsdf>\n\
             </scene>\n"
        );
    }

    #[test]
    fn test_unbalanced() {
        let mut xml = XmlWriter::new(Vec::new());
        assert!(xml.close().is_err());
        xml.open("scene", &[]).unwrap();
        assert!(matches!(xml.finish(), Err(ExportError::Xml(_))));
    }

    #[test]
    fn test_abort_closes_open_elements() {
        let mut xml = XmlWriter::new(Vec::new());
        xml.open("scene", &[]).unwrap();
        xml.open("shape", &[("type", "obj")]).unwrap();
        let text = String::from_utf8(xml.abort().unwrap()).unwrap();
        assert!(text.ends_with("\t</shape>\n</scene>\n"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
