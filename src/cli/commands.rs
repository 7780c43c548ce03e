use crate::pipeline::{PoemRequest, PoemStyle, ReadingLevel};
use crate::storage::EndingStyle;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "versecraft", version, about = "Taste-aware poem drafting assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a poem (draft + revised pass).
    Generate {
        #[command(flatten)]
        request: RequestArgs,
        /// Run one extra improvement pass after revising.
        #[arg(long)]
        improve: bool,
    },
    /// Improve the latest version of an existing session.
    Improve {
        /// Session to continue.
        #[arg(long)]
        session: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Rate a stored version 1-5.
    Rate {
        #[arg(long)]
        version: String,
        #[arg(long)]
        score: u8,
        #[arg(long, value_enum)]
        ending: Option<EndingStyle>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Manage the people memory.
    Person {
        #[command(subcommand)]
        command: PersonCommands,
    },
    /// Show (or rebuild) the learned taste profile.
    Profile {
        /// Recompute from the full rating history before showing.
        #[arg(long)]
        recompute: bool,
    },
    /// List the versions of a session with their per-stage averages.
    Versions {
        #[arg(long)]
        session: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PersonCommands {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        relationship: String,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    /// Replace a person's notes.
    Note {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        notes: Option<String>,
    },
    Remove {
        #[arg(long)]
        id: i64,
    },
}

/// Commission flags shared by `generate` and `improve`.
#[derive(Debug, Args)]
pub struct RequestArgs {
    #[arg(long)]
    pub theme: String,
    #[arg(long, default_value = "just for fun")]
    pub occasion: String,
    #[arg(long)]
    pub audience: Option<String>,
    #[arg(long, value_enum, default_value_t = PoemStyle::FreeVerse)]
    pub style: PoemStyle,
    #[arg(long, default_value = "warm")]
    pub tone: String,
    #[arg(long)]
    pub writer_vibe: Option<String>,
    #[arg(long = "include")]
    pub must_include: Vec<String>,
    #[arg(long = "avoid")]
    pub avoid: Vec<String>,
    #[arg(long, default_value_t = 12)]
    pub lines: u32,
    #[arg(long)]
    pub rhyme: bool,
    #[arg(long)]
    pub syllable_hints: Option<String>,
    /// Allow stock phrases (off by default).
    #[arg(long)]
    pub allow_cliches: bool,
    #[arg(long, value_enum, default_value_t = ReadingLevel::General)]
    pub reading_level: ReadingLevel,
    #[arg(long)]
    pub acrostic_word: Option<String>,
    /// Person id from the people memory to write for.
    #[arg(long = "for-person")]
    pub person_id: Option<i64>,
}

impl From<RequestArgs> for PoemRequest {
    fn from(args: RequestArgs) -> Self {
        Self {
            theme: args.theme,
            occasion: args.occasion,
            audience: args.audience,
            style: args.style,
            tone: args.tone,
            writer_vibe: args.writer_vibe,
            must_include: args.must_include,
            avoid: args.avoid,
            line_count: args.lines,
            rhyme: args.rhyme,
            syllable_hints: args.syllable_hints,
            no_cliches: !args.allow_cliches,
            reading_level: args.reading_level,
            acrostic_word: args.acrostic_word,
            person_id: args.person_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_parses_with_defaults() {
        let cli = Cli::try_parse_from(["versecraft", "generate", "--theme", "autumn"]).unwrap();
        match cli.command {
            Commands::Generate { request, improve } => {
                assert_eq!(request.theme, "autumn");
                assert_eq!(request.lines, 12);
                assert!(!improve);
                let req: PoemRequest = request.into();
                assert!(req.no_cliches);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rate_requires_score() {
        assert!(Cli::try_parse_from(["versecraft", "rate", "--version", "v1"]).is_err());
    }

    #[test]
    fn ending_value_enum_parses() {
        let cli = Cli::try_parse_from([
            "versecraft", "rate", "--version", "v1", "--score", "4", "--ending", "hopeful",
        ])
        .unwrap();
        match cli.command {
            Commands::Rate { ending, score, .. } => {
                assert_eq!(score, 4);
                assert_eq!(ending, Some(EndingStyle::Hopeful));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
