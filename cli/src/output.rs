/// cli/src/output.rs
/// Output utilities for the CLI
/// description: styled report lines for `run`, and comfy-table renderings
/// of the resumption table and hoisted storage for `lower --table`.

use std::io::{self, Write};

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use console::Style;
use resumable_core::ast::{NodeKind, NodeRef};
use resumable_core::LoweredBody;

/// Styles for different output elements
pub struct FormatStyle {
    pub title: Style,
    pub subtitle: Style,
    pub info: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
}

impl Default for FormatStyle {
    fn default() -> Self {
        FormatStyle {
            title: Style::new().bold().underlined(),
            subtitle: Style::new().bold(),
            info: Style::new().cyan(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            success: Style::new().green().bold(),
        }
    }
}

/// Printer that writes styled report lines into any `Write`.
pub struct Printer<T: Write> {
    out: T,
    formatting: FormatStyle,
}

impl<T: Write> Printer<T> {
    pub fn new(out: T) -> Self {
        Printer { out, formatting: FormatStyle::default() }
    }

    pub fn title(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.formatting.title.apply_to(text))
    }

    pub fn field(&mut self, label: &str, value: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{} {}", self.formatting.subtitle.apply_to(format!("{}:", label)), value)
    }

    pub fn trace(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "  {} {}", self.formatting.info.apply_to("trace"), line)
    }

    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.formatting.warning.apply_to(text))
    }

    pub fn error(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.formatting.error.apply_to(text))
    }

    pub fn success(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.formatting.success.apply_to(text))
    }

    pub fn raw(&mut self, text: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }
}

/// Last jump target inside a resume case, i.e. where re-entry lands.
fn jump_target(body: &NodeRef) -> Option<String> {
    match &body.kind {
        NodeKind::Goto { target } => Some(target.name.clone()),
        NodeKind::Block { statements, .. } => statements.iter().rev().find_map(jump_target),
        _ => None,
    }
}

/// One row per outer resume case: the states it covers and where it lands.
pub fn resume_table(lowered: &LoweredBody) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["States", "Resumes at", "Kind"]);
    for case in &lowered.resume_cases {
        let states = case.tests.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
        let target = jump_target(&case.body).unwrap_or_else(|| "?".to_string());
        let kind = if target.starts_with("__enterTry") { "region entry" } else { "suspend point" };
        table.add_row(vec![states, target, kind.to_string()]);
    }
    table
}

/// Every persisted slot with its origin.
pub fn storage_table(lowered: &LoweredBody) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Variable", "Type", "Origin"]);
    table.add_row(vec![lowered.contract.state.to_string(), lowered.contract.state.ty.to_string(), "state".to_string()]);
    for v in &lowered.hoisted {
        table.add_row(vec![v.to_string(), v.ty.to_string(), "hoisted".to_string()]);
    }
    for v in &lowered.fields {
        table.add_row(vec![v.to_string(), v.ty.to_string(), "field".to_string()]);
    }
    table
}
