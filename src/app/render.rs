//! Terminal and JSON output

use crate::app::cli::args::OutputFormat;
use crate::app::error::AppError;
use crate::core::styles::StyleRole;
use crate::extension::api::{ModuleState, ModuleSummary, Query, ResultItem, RouteOutcome};
use prettytable::{format, Cell, Row, Table};
use std::collections::BTreeSet;

fn cell(text: &str, role: StyleRole, color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec().filter(|_| color) {
        Some(spec) => cell.style_spec(&spec),
        None => cell,
    }
}

fn header(titles: &[&str], color: bool) -> Row {
    Row::new(
        titles
            .iter()
            .map(|t| {
                let c = cell(t, StyleRole::Header, color);
                if color {
                    c.with_style(prettytable::Attr::Bold)
                } else {
                    c
                }
            })
            .collect(),
    )
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table
}

fn print_table(table: &Table, color: bool) -> Result<(), AppError> {
    if color {
        table
            .print_tty(true)
            .map(|_| ())
            .map_err(|e| AppError::Output {
                message: e.to_string(),
            })
    } else {
        print!("{}", table);
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Output {
        message: e.to_string(),
    })
}

pub fn modules_table(modules: &[ModuleSummary], color: bool) -> Table {
    let mut table = new_table();
    table.set_titles(header(
        &["ID", "NAME", "TRIGGER", "VERSION", "ENABLED", "STATE", "ERROR"],
        color,
    ));

    for m in modules {
        let state_role = match (m.state, &m.last_error) {
            (ModuleState::Loaded, _) => StyleRole::Loaded,
            (ModuleState::Unloaded, Some(_)) => StyleRole::Error,
            (ModuleState::Unloaded, None) => StyleRole::Unloaded,
        };
        table.add_row(Row::new(vec![
            cell(&m.id, StyleRole::Literal, color),
            cell(&m.name, StyleRole::Value, color),
            cell(&format!("{:?}", m.trigger), StyleRole::Trigger, color),
            cell(&m.version, StyleRole::Value, color),
            cell(if m.enabled { "yes" } else { "no" }, StyleRole::Value, color),
            cell(&m.state.to_string(), state_role, color),
            cell(
                m.last_error.as_deref().unwrap_or(""),
                StyleRole::Error,
                color,
            ),
        ]));
    }
    table
}

pub fn print_modules(
    modules: &[ModuleSummary],
    output: OutputFormat,
    color: bool,
) -> Result<(), AppError> {
    match output {
        OutputFormat::Json => println!("{}", to_json(&modules)?),
        OutputFormat::Table if modules.is_empty() => println!("No modules found"),
        OutputFormat::Table => print_table(&modules_table(modules, color), color)?,
    }
    Ok(())
}

pub fn results_table(items: &[ResultItem], color: bool) -> Table {
    let mut table = new_table();
    table.set_titles(header(&["TEXT", "SUBTEXT", "ACTIONS"], color));
    for item in items {
        let actions: Vec<&str> = item.actions.iter().map(|a| a.text()).collect();
        table.add_row(Row::new(vec![
            cell(&item.text, StyleRole::Value, color),
            cell(&item.subtext, StyleRole::Unloaded, color),
            cell(&actions.join(", "), StyleRole::Literal, color),
        ]));
    }
    table
}

pub fn print_results(
    query: &Query,
    outcome: &RouteOutcome,
    output: OutputFormat,
    color: bool,
) -> Result<(), AppError> {
    match output {
        OutputFormat::Json => {
            let document = serde_json::json!({
                "trigger": query.trigger(),
                "text": query.text(),
                "valid": query.is_valid(),
                "handledBy": outcome.handled_by,
                "failures": outcome.failures,
                "items": query.results(),
            });
            println!("{}", to_json(&document)?);
        }
        OutputFormat::Table => {
            if outcome.handled_by.is_empty() {
                println!("No module handled the request");
            } else if query.results().is_empty() {
                println!("No results from {}", outcome.handled_by.join(", "));
            } else {
                print_table(&results_table(query.results(), color), color)?;
            }
        }
    }
    Ok(())
}

pub fn print_triggers(triggers: &BTreeSet<String>, color: bool) {
    for trigger in triggers {
        println!("{}", StyleRole::Trigger.paint(&format!("{:?}", trigger), color));
    }
}
