mod commands;

pub use commands::{Cli, Commands, PersonCommands, RequestArgs};

use crate::orchestrator::Orchestrator;
use crate::pipeline::PoemRequest;
use anyhow::{bail, Result};

/// Map a parsed command onto the orchestrator and print the outcome.
pub async fn dispatch(cli: Cli, orchestrator: &Orchestrator) -> Result<()> {
    match cli.command {
        Commands::Generate { request, improve } => {
            let request: PoemRequest = request.into();
            let version = if improve {
                orchestrator.generate_and_improve(&request).await?
            } else {
                orchestrator.generate_only(&request).await?
            };
            println!(
                "session {}  version {} ({})\n\n{}",
                version.session_id,
                version.index,
                version.stage.as_str(),
                version.text
            );
        }
        Commands::Improve { session, request } => {
            let request: PoemRequest = request.into();
            let versions = orchestrator.versions(&session).await?;
            let Some(latest) = versions.last() else {
                bail!("session {session} has no versions");
            };
            let improved = orchestrator.improve_again(latest, &request).await?;
            println!(
                "session {}  version {} ({})\n\n{}",
                improved.session_id,
                improved.index,
                improved.stage.as_str(),
                improved.text
            );
        }
        Commands::Rate {
            version,
            score,
            ending,
            feedback,
        } => {
            let rating = orchestrator
                .submit_rating(&version, score, ending, feedback)
                .await?;
            println!("rated version {} with {}", rating.version_id, rating.score);
        }
        Commands::Person { command } => dispatch_person(command, orchestrator).await?,
        Commands::Profile { recompute } => {
            let profile = if recompute {
                orchestrator.recompute_taste().await?
            } else {
                orchestrator.taste_profile().await?
            };
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Versions { session } => {
            let versions = orchestrator.versions(&session).await?;
            if versions.is_empty() {
                bail!("session {session} has no versions");
            }
            let averages = orchestrator.version_averages(&session).await?;
            for version in &versions {
                let avg = averages
                    .iter()
                    .find(|a| a.stage == version.stage)
                    .map(|a| format!("  avg rating {:.1} ({} votes)", a.average, a.count))
                    .unwrap_or_default();
                println!("v{} [{}] {}{avg}", version.index, version.stage.as_str(), version.id);
            }
        }
    }
    Ok(())
}

async fn dispatch_person(command: PersonCommands, orchestrator: &Orchestrator) -> Result<()> {
    match command {
        PersonCommands::Add {
            name,
            relationship,
            notes,
        } => {
            let person = orchestrator
                .add_person(&name, &relationship, notes.as_deref())
                .await?;
            println!("saved {} ({}) as #{}", person.name, person.relationship, person.id);
        }
        PersonCommands::List => {
            let people = orchestrator.list_people().await?;
            if people.is_empty() {
                println!("no people saved yet");
            }
            for person in people {
                let notes = person.notes.as_deref().unwrap_or("-");
                println!("#{} {} ({}) {notes}", person.id, person.name, person.relationship);
            }
        }
        PersonCommands::Note { id, notes } => {
            orchestrator.update_person_notes(id, notes.as_deref()).await?;
            println!("updated notes for #{id}");
        }
        PersonCommands::Remove { id } => {
            orchestrator.delete_person(id).await?;
            println!("removed #{id}");
        }
    }
    Ok(())
}
