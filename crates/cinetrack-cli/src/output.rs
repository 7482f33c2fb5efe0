use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

/// Everything user-facing goes through here so `--output json` stays machine-readable
pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.message("success", msg.as_ref(), |m| println!("{} {}", "✓".green(), m));
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.message("info", msg.as_ref(), |m| println!("{}", m));
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.message("warning", msg.as_ref(), |m| println!("{} {}", "⚠".yellow(), m));
    }

    /// Always shown, even with --quiet
    pub fn error(&self, msg: impl AsRef<str>) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", "✗".red(), msg.as_ref()),
            _ => self.print_json(&json!({ "type": "error", "message": msg.as_ref() })),
        }
    }

    fn message(&self, kind: &str, msg: &str, human: impl FnOnce(&str)) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => human(msg),
            _ => self.print_json(&json!({ "type": kind, "message": msg })),
        }
    }

    /// Structured payload in JSON modes; `human` renders it otherwise
    pub fn data<T: Serialize>(&self, value: &T, human: impl FnOnce()) {
        if self.is_human() {
            if !self.quiet {
                human();
            }
            return;
        }
        match serde_json::to_value(value) {
            Ok(v) => self.print_json(&v),
            Err(e) => self.error(format!("Failed to serialize output: {}", e)),
        }
    }

    pub fn table(&self, table: &Table) {
        if !self.quiet && self.is_human() {
            println!("{}", table);
        }
    }

    fn print_json(&self, data: &serde_json::Value) {
        let rendered = match self.format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(data),
            _ => serde_json::to_string(data),
        };
        println!("{}", rendered.unwrap_or_default());
    }
}

pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    table
}
