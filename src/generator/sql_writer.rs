const INITIAL_CAPACITY: usize = 1024;

/// Output sink of the render pass.
///
/// In pretty mode line breaks are real and every line starts with one tab per
/// statement nesting level. Otherwise a line break collapses into a single
/// space (or nothing, right after a space or an opening parenthesis).
pub struct SqlWriter {
    out: String,
    indent: i32,
    at_line_start: bool,
    pretty: bool,
}

impl SqlWriter {
    pub fn new(pretty: bool) -> Self {
        Self {
            out: String::with_capacity(INITIAL_CAPACITY),
            indent: -1,
            at_line_start: false,
            pretty,
        }
    }

    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            if self.indent > 0 {
                for _ in 0..self.indent {
                    self.out.push('\t');
                }
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    pub fn write_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.write(c.encode_utf8(&mut buf));
    }

    pub fn new_line(&mut self) {
        if self.pretty {
            self.out.push('\n');
            self.at_line_start = true;
        } else if !(self.out.is_empty() || self.out.ends_with(' ') || self.out.ends_with('(')) {
            self.out.push(' ');
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent -= 1;
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}
