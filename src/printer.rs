use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

use crate::task::{ListItem, ListItemKind, ListMessageLevel, ListOutput, ListRenderMode};

const RESET: &str = "\x1b[0m";
const FG_CYAN: &str = "\x1b[36m";
const FG_MAGENTA: &str = "\x1b[35m";
const FG_YELLOW: &str = "\x1b[33m";
const FG_DIM: &str = "\x1b[90m";
const FG_WHITE: &str = "\x1b[97m";
const BG_MULTI: &str = "\x1b[48;5;24m";
const ERASE_TO_END: &str = "\x1b[K";

pub fn info(message: impl AsRef<str>) {
    write_line(io::stdout(), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    write_line(io::stderr(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    write_line(io::stderr(), message.as_ref());
}

fn write_line(mut target: impl Write, message: &str) {
    let _ = writeln!(target, "{}", message);
}

pub fn print_list(output: &ListOutput, mode: ListRenderMode) {
    for message in &output.messages {
        match message.level {
            ListMessageLevel::Info => info(&message.text),
            ListMessageLevel::Warn => warn(&message.text),
        }
    }
    for line in render_list(output, mode, colors_enabled()) {
        info(line);
    }
}

/// Renders list items as lines, without the accompanying messages.
pub fn render_list(output: &ListOutput, mode: ListRenderMode, color: bool) -> Vec<String> {
    match mode {
        ListRenderMode::Tree => render_tree(&output.items, color),
        ListRenderMode::Flat => render_flat(&output.items, color),
    }
}

fn symbol(kind: ListItemKind) -> char {
    match kind {
        ListItemKind::MultiTask => '>',
        ListItemKind::Task | ListItemKind::Target => '-',
        ListItemKind::DerivedTarget => '~',
        ListItemKind::Alias => '=',
    }
}

fn render_tree(items: &[ListItem], color: bool) -> Vec<String> {
    // Names line up per nesting level.
    let mut widths: HashMap<usize, usize> = HashMap::new();
    for item in items {
        let width = widths.entry(item.depth).or_default();
        *width = (*width).max(item.name.chars().count());
    }

    items
        .iter()
        .map(|item| {
            let width = widths.get(&item.depth).copied().unwrap_or_default();
            let head = format!(
                "{}{} {:width$}",
                "  ".repeat(item.depth),
                symbol(item.kind),
                item.name,
                width = width
            );
            let tail = item.description.as_deref().map(|desc| format!(" : {}", desc));
            match (color, tail) {
                (true, tail) => paint(item.kind, &head, tail.as_deref()),
                (false, Some(tail)) => format!("{}{}", head, tail),
                (false, None) => head.trim_end().to_string(),
            }
        })
        .collect()
}

fn render_flat(items: &[ListItem], color: bool) -> Vec<String> {
    let width = items
        .iter()
        .map(|item| item.full_name.chars().count())
        .max()
        .unwrap_or(0);

    items
        .iter()
        .map(|item| {
            let name = format!("{:width$}", item.full_name, width = width);
            match (&item.description, color) {
                (Some(desc), true) => format!("{FG_CYAN}{name}{RESET}  {FG_DIM}{desc}{RESET}"),
                (Some(desc), false) => format!("{}  {}", name, desc),
                (None, true) => format!("{FG_CYAN}{}{RESET}", name.trim_end()),
                (None, false) => name.trim_end().to_string(),
            }
        })
        .collect()
}

fn paint(kind: ListItemKind, head: &str, tail: Option<&str>) -> String {
    let tail = tail.unwrap_or_default();
    match kind {
        ListItemKind::MultiTask => {
            format!("{BG_MULTI}{FG_WHITE}{head}{tail}{ERASE_TO_END}{RESET}")
        }
        ListItemKind::Alias => format!("{FG_MAGENTA}{head}{RESET}{FG_DIM}{tail}{RESET}"),
        ListItemKind::DerivedTarget => format!("{FG_YELLOW}{head}{RESET}{FG_DIM}{tail}{RESET}"),
        ListItemKind::Task | ListItemKind::Target => {
            format!("{FG_CYAN}{head}{RESET}{FG_DIM}{tail}{RESET}")
        }
    }
}

fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| io::stdout().is_terminal())
}
