use std::fmt;

/// Make `text` safe to place after `//` in C. Control characters are written
/// as escapes, and a trailing backslash is spelled out so the comment cannot
/// continue onto the next line.
pub fn comment_text(text: &str) -> String {
    let mut clean = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() {
            clean.extend(c.escape_default());
        } else {
            clean.push(c);
        }
    }
    if clean.ends_with('\\') {
        clean.pop();
        clean.push_str("\\x5C");
    }
    clean
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Heading(String),
    Field { bytes: Vec<u8>, comment: String },
    Blank,
}

/// A byte table where every field carries the comment that ends up next to
/// it in the generated C initializer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    lines: Vec<Line>,
    len: usize,
}

impl Table {
    pub fn new() -> Table { Default::default() }

    pub fn heading<S: Into<String>>(&mut self, text: S) {
        self.lines.push(Line::Heading(comment_text(&text.into())))
    }

    pub fn blank(&mut self) { self.lines.push(Line::Blank) }

    /// Append raw bytes. Returns the number of bytes added.
    pub fn field<S: Into<String>>(&mut self, bytes: &[u8], comment: S) -> usize {
        self.lines.push(Line::Field { bytes: bytes.to_vec(), comment: comment_text(&comment.into()) });
        self.len += bytes.len();
        bytes.len()
    }

    pub fn byte<S: Into<String>>(&mut self, value: u8, comment: S) -> usize { self.field(&[value], comment) }

    /// Append a little-endian 16-bit word.
    pub fn word<S: Into<String>>(&mut self, value: u16, comment: S) -> usize {
        self.field(&value.to_le_bytes(), comment)
    }

    /// Append a little-endian 32-bit word.
    pub fn dword<S: Into<String>>(&mut self, value: u32, comment: S) -> usize {
        self.field(&value.to_le_bytes(), comment)
    }

    pub fn append(&mut self, other: Table) {
        self.len += other.len;
        self.lines.extend(other.lines);
    }

    /// Total number of bytes in the table.
    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len);
        for line in &self.lines {
            if let Line::Field { bytes: b, .. } = line {
                bytes.extend_from_slice(b);
            }
        }
        bytes
    }

    /// Write the table as the body of a C array initializer.
    pub fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Heading(text) => writeln!(out, "    // {}", text)?,
                Line::Blank => writeln!(out)?,
                Line::Field { bytes, comment } => {
                    let list = bytes.iter().map(|b| format!("0x{:02X},", b)).collect::<Vec<_>>().join(" ");
                    if list.len() < 12 {
                        writeln!(out, "    {:<12}// {}", list, comment)?;
                    } else {
                        writeln!(out, "    {} // {}", list, comment)?;
                    }
                }
            }
        }
        Ok(())
    }
}
