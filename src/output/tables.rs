use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// How a value should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Good,
    Warning,
    Bad,
}

/// One table cell, independent of the output medium.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub text: String,
    pub tone: Tone,
    /// Web page of the entity, rendered by formats that support links.
    pub link: Option<String>,
}

impl Entry {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
            link: None,
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: String) -> Self {
        self.link = Some(link);
        self
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Self::new(text, Tone::Plain)
    }
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Self::new(text, Tone::Plain)
    }
}

impl From<usize> for Entry {
    fn from(value: usize) -> Self {
        Self::new(value.to_string(), Tone::Plain)
    }
}

/// A titled table of a report view.
#[derive(Debug, Clone)]
pub struct Section {
    pub emoji: &'static str,
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Entry>>,
}

impl Section {
    pub fn new(emoji: &'static str, title: impl Into<String>, headers: Vec<&'static str>) -> Self {
        Self {
            emoji,
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Entry>) {
        self.rows.push(row);
    }
}

/// Adoption percentage coloured by how far along it is.
pub fn rate_entry(rate: f64) -> Entry {
    let tone = if rate >= 80.0 {
        Tone::Good
    } else if rate >= 50.0 {
        Tone::Warning
    } else {
        Tone::Bad
    };
    Entry::new(format!("{rate:.1}%"), tone)
}

pub fn status_entry(compliant: bool) -> Entry {
    if compliant {
        Entry::new("✓ Compliant", Tone::Good)
    } else {
        Entry::new("✗ Not compliant", Tone::Bad)
    }
}

/// `compliant/total` pair.
pub fn ratio_entry(compliant: usize, total: usize) -> Entry {
    Entry::from(format!("{compliant}/{total}"))
}

/// Table and cell creation helpers
pub fn create_table(colored: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    if !colored {
        table.force_no_tty();
    }
    table
}

pub fn section_table(section: &Section, colored: bool) -> Table {
    let mut table = create_table(colored);
    table.set_header(
        section
            .headers
            .iter()
            .map(|label| Cell::new(*label).fg(TableColor::Cyan)),
    );
    for row in &section.rows {
        table.add_row(row.iter().map(entry_cell));
    }
    table
}

fn entry_cell(entry: &Entry) -> Cell {
    let cell = Cell::new(&entry.text);
    match entry.tone {
        Tone::Plain => cell,
        Tone::Good => cell.fg(TableColor::Green),
        Tone::Warning => cell.fg(TableColor::Yellow),
        Tone::Bad => cell.fg(TableColor::Red),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_entry_thresholds() {
        assert_eq!(rate_entry(92.0).tone, Tone::Good);
        assert_eq!(rate_entry(50.0).tone, Tone::Warning);
        assert_eq!(rate_entry(12.5).tone, Tone::Bad);
        assert_eq!(rate_entry(12.5).text, "12.5%");
    }

    #[test]
    fn test_plain_table_has_no_escape_codes() {
        let mut section = Section::new("📦", "Repositories", vec!["Repository", "Status"]);
        section.push(vec!["web".into(), status_entry(true)]);

        let rendered = section_table(&section, false).to_string();
        assert!(rendered.contains("web"));
        assert!(rendered.contains("✓ Compliant"));
        assert!(!rendered.contains('\u{1b}'));
    }
}
