//! Human-readable report stream.
//!
//! Lines follow a small tree convention: a header per module, `├─ ` for each
//! entry and `│    ` for the detail lines underneath it. Colour is decided
//! by the caller and carried as a flag; nothing here touches global state.

use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};

const ENTRY_PREFIX: &str = "├─ ";
const DETAIL_PREFIX: &str = "│    ";
const DIFF_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Plain,
    Added,
    Removed,
    Changed,
    Heading,
    Warning,
}

/// Collects report lines and optionally echoes them to stdout
#[derive(Debug, Default)]
pub struct Reporter {
    color: bool,
    echo: bool,
    lines: Vec<String>,
}

impl Reporter {
    /// Reporter printing every line to stdout as it is produced
    pub fn stdout(color: bool) -> Self {
        Self {
            color,
            echo: true,
            lines: Vec::new(),
        }
    }

    /// Silent, uncoloured reporter that only records lines
    pub fn buffered() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn module(&mut self, name: &str) {
        let line = self.paint(format!("[{}]", name), Tone::Heading);
        self.push(line);
    }

    pub fn section(&mut self, title: &str) {
        let line = self.paint(title.to_string(), Tone::Heading);
        self.push(line);
    }

    pub fn created(&mut self, what: &str) {
        let line = self.paint(format!("created {}", what), Tone::Added);
        self.entry(line);
    }

    pub fn updated(&mut self, what: &str) {
        let line = self.paint(format!("updated {}", what), Tone::Changed);
        self.entry(line);
    }

    /// Plain entry line, e.g. a service or package action
    pub fn action(&mut self, text: &str) {
        let line = self.paint(text.to_string(), Tone::Changed);
        self.entry(line);
    }

    pub fn warning(&mut self, text: &str) {
        let line = self.paint(format!("warning: {}", text), Tone::Warning);
        self.entry(line);
    }

    pub fn error(&mut self, text: &str) {
        let line = self.paint(format!("error: {}", text), Tone::Removed);
        self.entry(line);
    }

    /// Before/after line for one attribute
    pub fn attribute_change(&mut self, attribute: &str, before: &str, after: &str) {
        self.detail(format!("{}: {} -> {}", attribute, before, after));
    }

    /// Unified diff of `old` against `new`
    pub fn diff(&mut self, old: &str, new: &str) {
        for line in render_diff(old, new, self.color) {
            self.detail(line);
        }
    }

    pub fn plain(&mut self, text: &str) {
        self.push(text.to_string());
    }

    fn entry(&mut self, text: String) {
        self.push(format!("{}{}", ENTRY_PREFIX, text));
    }

    fn detail(&mut self, text: String) {
        self.push(format!("{}{}", DETAIL_PREFIX, text));
    }

    fn push(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.lines.push(line);
    }

    fn paint(&self, text: String, tone: Tone) -> String {
        paint(text, tone, self.color)
    }
}

fn paint(text: String, tone: Tone, color: bool) -> String {
    if !color {
        return text;
    }
    match tone {
        Tone::Plain => text,
        Tone::Added => text.green().to_string(),
        Tone::Removed => text.red().to_string(),
        Tone::Changed => text.yellow().to_string(),
        Tone::Heading => text.bold().to_string(),
        Tone::Warning => text.bright_red().to_string(),
    }
}

/// Render a unified diff, one string per output line, without file headers.
/// Removed lines start with `-`, added lines with `+`.
pub fn render_diff(old: &str, new: &str, color: bool) -> Vec<String> {
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.context_radius(DIFF_CONTEXT);

    let mut lines = Vec::new();
    for hunk in unified.iter_hunks() {
        let header = hunk.header().to_string();
        lines.push(if color {
            header.cyan().to_string()
        } else {
            header
        });

        for change in hunk.iter_changes() {
            let (sign, tone) = match change.tag() {
                ChangeTag::Delete => ('-', Tone::Removed),
                ChangeTag::Insert => ('+', Tone::Added),
                ChangeTag::Equal => (' ', Tone::Plain),
            };
            let text = change.value().trim_end_matches(['\n', '\r']);
            lines.push(paint(format!("{}{}", sign, text), tone, color));
        }
    }
    lines
}
