use clap::{Args, Parser, Subcommand};
use client_core::{FieldFilter, SortDirection, SortSpec};
use shared::domain::FieldKey;

#[derive(Parser, Debug)]
#[command(name = "recipients", about = "Browse and edit recipients held by the store")]
pub struct Cli {
    /// Overrides `server_url` from recipients.toml and the environment.
    #[arg(long)]
    pub server_url: Option<String>,
    /// Print views and results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the table once.
    List(ViewArgs),
    /// Open a session on one recipient, apply the assignments and commit.
    Edit {
        id: i64,
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment, required = true)]
        assignments: Vec<(FieldKey, String)>,
    },
    Create {
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(FieldKey, String)>,
    },
    Delete {
        id: i64,
    },
    /// Reprint the table every time the store revision moves.
    Watch(ViewArgs),
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    #[arg(long, value_name = "FIELD[:asc|desc]", value_parser = parse_sort, conflicts_with_all = ["sort_name", "sort_age"])]
    pub sort: Option<SortSpec>,
    /// First name, descending.
    #[arg(long, conflicts_with = "sort_age")]
    pub sort_name: bool,
    /// Oldest first.
    #[arg(long)]
    pub sort_age: bool,
    #[arg(long = "filter", value_name = "FIELD=V1[,V2]", value_parser = parse_filter)]
    pub filters: Vec<(FieldKey, FieldFilter)>,
}

pub fn parse_sort(raw: &str) -> Result<SortSpec, String> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, direction)) => (field, Some(direction)),
        None => (raw, None),
    };
    let field = field.parse::<FieldKey>().map_err(|err| err.to_string())?;
    let direction = match direction.map(|d| d.trim().to_ascii_lowercase()).as_deref() {
        None | Some("asc") | Some("ascending") => SortDirection::Ascending,
        Some("desc") | Some("descending") => SortDirection::Descending,
        Some(other) => return Err(format!("unknown sort direction '{other}'")),
    };
    Ok(SortSpec::new(field, direction))
}

pub fn parse_filter(raw: &str) -> Result<(FieldKey, FieldFilter), String> {
    let (field, values) = split_assignment(raw)?;
    let filter = FieldFilter::parse(field, values).map_err(|err| err.to_string())?;
    Ok((field, filter))
}

pub fn parse_assignment(raw: &str) -> Result<(FieldKey, String), String> {
    let (field, value) = split_assignment(raw)?;
    Ok((field, value.to_string()))
}

fn split_assignment(raw: &str) -> Result<(FieldKey, &str), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.parse::<FieldKey>().map_err(|err| err.to_string())?;
    Ok((field, value))
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
