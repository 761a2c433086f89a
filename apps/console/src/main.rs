use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    load_client_settings, FieldValue, HttpRemoteStore, MutationOutcome, RecipientDraft,
    RecipientTable, RemoteStore, SessionError,
};
use shared::domain::RecipientId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod render;

use cli::{Cli, Command, ViewArgs};
use render::{render_table, render_violations};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_client_settings()?;
    if let Some(server_url) = cli.server_url {
        settings = settings.with_server_url(server_url)?;
    }
    let store: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::new(&settings)?);
    let table = RecipientTable::new(store);
    table
        .refresh()
        .await
        .with_context(|| format!("failed to load recipients from {}", settings.server_url))?;

    match cli.command {
        Command::List(view) => {
            apply_view_args(&table, view)?;
            print_view(&table, cli.json)?;
        }
        Command::Edit { id, assignments } => {
            table.request_edit(RecipientId(id))?;
            for (field, raw) in assignments {
                table.edit_field(field, FieldValue::parse_for(field, &raw)?)?;
            }
            let outcome = table.commit_edit().await;
            if outcome.is_err() {
                if let Err(err) = table.cancel_edit() {
                    warn!(recipient_id = id, error = %err, "could not discard rejected draft");
                }
            }
            report_mutation("updated", outcome, cli.json)?;
        }
        Command::Create { assignments } => {
            let mut draft = RecipientDraft {
                active_status: true,
                ..RecipientDraft::default()
            };
            for (field, raw) in assignments {
                draft.set(field, FieldValue::parse_for(field, &raw)?)?;
            }
            let outcome = table.create_recipient(&draft).await;
            report_mutation("created", outcome, cli.json)?;
        }
        Command::Delete { id } => {
            let outcome = table.delete_recipient(RecipientId(id)).await;
            report_mutation("deleted", outcome, cli.json)?;
        }
        Command::Watch(view) => {
            apply_view_args(&table, view)?;
            watch(&table, settings.revision_poll_interval, cli.json).await?;
        }
    }

    Ok(())
}

fn apply_view_args(table: &RecipientTable, args: ViewArgs) -> Result<()> {
    if let Some(sort) = args.sort {
        table.set_sort(sort.field, sort.direction);
    } else if args.sort_name {
        table.sort_by_first_name();
    } else if args.sort_age {
        table.sort_by_age();
    }
    for (field, filter) in args.filters {
        table.set_filter(field, filter)?;
    }
    Ok(())
}

fn print_view(table: &RecipientTable, json: bool) -> Result<()> {
    let view = table.view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render_table(&view));
    }
    Ok(())
}

fn report_mutation(
    verb: &str,
    outcome: Result<MutationOutcome, SessionError>,
    json: bool,
) -> Result<()> {
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(SessionError::Validation(violations)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&violations)?);
            } else {
                eprint!("{}", render_violations(&violations));
            }
            bail!("recipient {verb} rejected: {} invalid field(s)", violations.len());
        }
        Err(err) => return Err(err.into()),
    };

    if let Err(err) = &outcome.refresh {
        warn!(error = %err, "change saved but the table could not be refreshed");
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "recipient_id": outcome.recipient_id, "action": verb })
        );
    } else {
        println!("{verb} recipient_id={}", outcome.recipient_id);
    }
    Ok(())
}

async fn watch(table: &RecipientTable, interval: std::time::Duration, json: bool) -> Result<()> {
    let mut updates = table.synchronizer().subscribe();
    let poller = table.synchronizer().spawn_revision_watch(interval);
    info!(?interval, "watching store revision; press ctrl-c to stop");
    print_view(table, json)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(table, json)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.abort();
    Ok(())
}
