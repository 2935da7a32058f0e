//! Help and usage rendering.
//!
//! Everything here is a pure function from schemas to text. Styling uses
//! `anstyle`; with color disabled every style is plain and the output is
//! byte-for-byte the unstyled text.

use std::fmt::Write;

use anstyle::{AnsiColor, Style};

use crate::config::CommandOrder;
use crate::router::CommandRegistry;
use crate::schema::{CommandSchema, ParameterSpec};
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
struct Styles {
    header: Style,
    literal: Style,
    placeholder: Style,
}

impl Styles {
    fn colored() -> Self {
        Self {
            header: Style::new().bold().underline(),
            literal: Style::new().bold().fg_color(Some(AnsiColor::Cyan.into())),
            placeholder: Style::new().fg_color(Some(AnsiColor::Green.into())),
        }
    }

    fn plain() -> Self {
        Self {
            header: Style::new(),
            literal: Style::new(),
            placeholder: Style::new(),
        }
    }
}

fn paint(style: Style, text: &str) -> String {
    if style.is_plain() {
        text.to_string()
    } else {
        format!("{}{}{}", style.render(), text, style.render_reset())
    }
}

/// A left column (measured unstyled) and its description.
struct Row {
    width: usize,
    left: String,
    right: String,
}

fn write_rows(out: &mut String, rows: &[Row]) {
    let width = rows.iter().map(|r| r.width).max().unwrap_or(0);
    for row in rows {
        if row.right.is_empty() {
            let _ = writeln!(out, "  {}", row.left);
        } else {
            let pad = width - row.width;
            let _ = writeln!(out, "  {}{}    {}", row.left, " ".repeat(pad), row.right);
        }
    }
}

/// Renders usage text for one command or for the whole application.
#[derive(Debug, Clone)]
pub struct HelpBuilder {
    program: String,
    description: Option<String>,
    order: CommandOrder,
    styles: Styles,
}

impl HelpBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            description: None,
            order: CommandOrder::Registration,
            styles: Styles::plain(),
        }
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn order(mut self, order: CommandOrder) -> Self {
        self.order = order;
        self
    }

    pub fn color(mut self, enabled: bool) -> Self {
        self.styles = if enabled {
            Styles::colored()
        } else {
            Styles::plain()
        };
        self
    }

    /// Full help for one command: usage, description, arguments, options.
    pub fn command_help(&self, schema: &CommandSchema) -> String {
        let mut out = String::new();
        out.push_str(&self.usage_line(schema));
        out.push('\n');

        if !schema.description().is_empty() {
            let _ = writeln!(out, "\n{}", schema.description());
        }

        let arguments = self.argument_rows(schema);
        if !arguments.is_empty() {
            let _ = writeln!(out, "\n{}", paint(self.styles.header, "Arguments:"));
            write_rows(&mut out, &arguments);
        }

        let options = self.option_rows(schema);
        if !options.is_empty() {
            let _ = writeln!(out, "\n{}", paint(self.styles.header, "Options:"));
            write_rows(&mut out, &options);
        }

        out
    }

    /// Application overview: the root command's help (if any) and the command list.
    pub fn overview(&self, registry: &CommandRegistry) -> String {
        let mut out = String::new();

        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "{}\n", description);
        }

        match registry.root() {
            Some(root) => out.push_str(&self.command_help(registry.schema(root))),
            None => {
                let _ = writeln!(
                    out,
                    "{} {} {} [-h|--help] [--version]",
                    paint(self.styles.header, "Usage:"),
                    paint(self.styles.literal, &self.program),
                    paint(self.styles.placeholder, "[command]"),
                );
            }
        }

        let mut commands: Vec<&CommandSchema> = registry
            .commands()
            .map(|(_, schema)| schema.as_ref())
            .filter(|schema| !schema.is_root() && !schema.is_hidden())
            .collect();
        if self.order == CommandOrder::Alphabetical {
            commands.sort_by_key(|schema| schema.name().to_lowercase());
        }

        if !commands.is_empty() {
            let rows: Vec<Row> = commands
                .iter()
                .map(|schema| Row {
                    width: schema.name().chars().count(),
                    left: paint(self.styles.literal, schema.name()),
                    right: schema.description().to_string(),
                })
                .collect();
            let _ = writeln!(out, "\n{}", paint(self.styles.header, "Commands:"));
            write_rows(&mut out, &rows);
        }

        out
    }

    fn usage_line(&self, schema: &CommandSchema) -> String {
        let mut parts = vec![
            paint(self.styles.header, "Usage:"),
            paint(self.styles.literal, &self.program),
        ];
        if !schema.is_root() {
            parts.push(paint(self.styles.literal, schema.name()));
        }
        if schema.has_positional() {
            parts.push(paint(self.styles.placeholder, "[arguments...]"));
        }
        if schema.has_named() {
            parts.push(paint(self.styles.placeholder, "[options...]"));
        }
        parts.push("[-h|--help] [--version]".to_string());
        parts.join(" ")
    }

    fn argument_rows(&self, schema: &CommandSchema) -> Vec<Row> {
        let mut positional: Vec<&ParameterSpec> = schema
            .parameters()
            .iter()
            .filter(|p| p.is_positional() && !p.is_hidden())
            .collect();
        positional.sort_by_key(|p| p.positional_index());

        positional
            .into_iter()
            .map(|param| {
                let index = format!("[{}]", param.positional_index());
                let ty = format!("<{}>", param.param_type().display_name());
                Row {
                    width: index.len() + 1 + ty.chars().count(),
                    left: format!(
                        "{} {}",
                        paint(self.styles.literal, &index),
                        paint(self.styles.placeholder, &ty)
                    ),
                    right: join_description(param.doc(), &annotation(param)),
                }
            })
            .collect()
    }

    fn option_rows(&self, schema: &CommandSchema) -> Vec<Row> {
        schema
            .parameters()
            .iter()
            .filter(|p| !p.is_positional() && !p.is_injected() && !p.is_hidden())
            .map(|param| {
                let flags = param.flag_names().collect::<Vec<_>>().join(", ");
                let mut width = flags.chars().count();
                let mut left = paint(self.styles.literal, &flags);
                if !param.param_type().is_switch() {
                    let ty = format!("<{}>", param.param_type().display_name());
                    width += 1 + ty.chars().count();
                    left = format!("{} {}", left, paint(self.styles.placeholder, &ty));
                }
                Row {
                    width,
                    left,
                    right: join_description(param.doc(), &annotation(param)),
                }
            })
            .collect()
    }
}

fn annotation(param: &ParameterSpec) -> String {
    if param.requires_explicit_binding() {
        return "(Required)".to_string();
    }
    match param.default_value() {
        Some(Value::Bool(false)) | None => "(Optional)".to_string(),
        Some(default) => format!("(Default: {})", default),
    }
}

fn join_description(doc: &str, annotation: &str) -> String {
    if doc.is_empty() {
        annotation.to_string()
    } else {
        format!("{} {}", doc, annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Command, NameConversion};

    fn finalized(cmd: Command) -> CommandSchema {
        cmd.into_parts().0.finalize(NameConversion::KebabCase).unwrap()
    }

    fn registry(commands: Vec<Command>) -> CommandRegistry {
        CommandRegistry::build(commands, NameConversion::KebabCase).unwrap()
    }

    #[test]
    fn test_required_option_help() {
        let schema = finalized(
            Command::new("greet")
                .description("Say hello")
                .param(ParameterSpec::of::<String>("name").alias("n").description("Who to greet")),
        );
        let help = HelpBuilder::new("app").command_help(&schema);

        assert!(help.starts_with("Usage: app greet [options...] [-h|--help] [--version]"));
        assert!(help.contains("Say hello"));
        assert!(help.contains("Options:"));
        assert!(help.contains("--name, -n <string>"));
        assert!(help.contains("Who to greet (Required)"));
        assert!(!help.contains("Arguments:"));
    }

    #[test]
    fn test_annotations() {
        let schema = finalized(
            Command::root()
                .param(ParameterSpec::of::<String>("file").positional())
                .param(ParameterSpec::of::<bool>("force"))
                .param(ParameterSpec::of::<i32>("retries").default(3))
                .param(ParameterSpec::of::<Option<String>>("tag").optional())
                .param(ParameterSpec::of::<String>("secret").hidden().default("x")),
        );
        let help = HelpBuilder::new("app").command_help(&schema);

        assert!(help.contains("Usage: app [arguments...] [options...]"));
        assert!(help.contains("[0] <string>"));
        assert!(help.contains("--force "));
        assert!(!help.contains("--force <"));
        assert!(help.contains("--retries <i32>"));
        assert!(help.contains("(Default: 3)"));
        assert!(help.contains("--tag <string?>"));
        assert!(!help.contains("secret"));

        let force_line = help.lines().find(|l| l.contains("--force")).unwrap();
        assert!(force_line.ends_with("(Optional)"));
        let tag_line = help.lines().find(|l| l.contains("--tag")).unwrap();
        assert!(tag_line.ends_with("(Default: null)"), "{}", tag_line);
    }

    #[test]
    fn test_overview_lists_visible_commands() {
        let reg = registry(vec![
            Command::new("zeta").description("Last").handler_sync(|_| ()),
            Command::new("alpha").description("First").handler_sync(|_| ()),
            Command::new("debug dump").hidden().handler_sync(|_| ()),
        ]);

        let text = HelpBuilder::new("app").overview(&reg);
        assert!(text.contains("Usage: app [command]"));
        assert!(text.contains("Commands:"));
        assert!(!text.contains("debug dump"));
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());

        let sorted = HelpBuilder::new("app")
            .order(CommandOrder::Alphabetical)
            .overview(&reg);
        assert!(sorted.find("alpha").unwrap() < sorted.find("zeta").unwrap());
    }

    #[test]
    fn test_overview_with_root_shows_root_help() {
        let reg = registry(vec![
            Command::root()
                .param(ParameterSpec::of::<i32>("x"))
                .handler_sync(|_| ()),
            Command::new("sub").handler_sync(|_| ()),
        ]);
        let text = HelpBuilder::new("app")
            .description(Some("Demo tool".into()))
            .overview(&reg);
        assert!(text.starts_with("Demo tool\n"));
        assert!(text.contains("--x <i32>"));
        assert!(text.contains("Commands:\n  sub"));
    }

    #[test]
    fn test_colored_output_keeps_text() {
        let schema = finalized(Command::new("run").param(ParameterSpec::of::<i32>("n")));
        let help = HelpBuilder::new("app").color(true).command_help(&schema);
        assert!(help.contains('\u{1b}'));
        assert!(help.contains("Options:"));
        assert!(help.contains("--n"));
    }
}
