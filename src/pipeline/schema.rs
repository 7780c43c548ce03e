use serde::{Deserialize, Serialize};

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PoemStyle {
    #[default]
    FreeVerse,
    Haiku,
    Limerick,
    Acrostic,
    SonnetLike,
    SpokenWord,
    RhymedCouplets,
}

impl PoemStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreeVerse => "free_verse",
            Self::Haiku => "haiku",
            Self::Limerick => "limerick",
            Self::Acrostic => "acrostic",
            Self::SonnetLike => "sonnet_like",
            Self::SpokenWord => "spoken_word",
            Self::RhymedCouplets => "rhymed_couplets",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReadingLevel {
    Simple,
    #[default]
    General,
    Advanced,
}

impl ReadingLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::General => "general",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simple" => Some(Self::Simple),
            "general" => Some(Self::General),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// One poem commission. Immutable once handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoemRequest {
    pub theme: String,
    #[serde(default = "default_occasion")]
    pub occasion: String,
    #[serde(default)]
    pub audience: Option<String>,

    #[serde(default)]
    pub style: PoemStyle,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub writer_vibe: Option<String>,

    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,

    #[serde(default = "default_line_count")]
    pub line_count: u32,
    #[serde(default)]
    pub rhyme: bool,
    #[serde(default)]
    pub syllable_hints: Option<String>,
    #[serde(default = "default_true")]
    pub no_cliches: bool,
    #[serde(default)]
    pub reading_level: ReadingLevel,

    #[serde(default)]
    pub acrostic_word: Option<String>,

    /// Reference into the people table; resolved by the orchestrator into
    /// generate-stage variables.
    #[serde(default)]
    pub person_id: Option<i64>,
}

fn default_occasion() -> String {
    "just for fun".to_string()
}

fn default_tone() -> String {
    "warm".to_string()
}

fn default_line_count() -> u32 {
    12
}

fn default_true() -> bool {
    true
}

impl PoemRequest {
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            occasion: default_occasion(),
            audience: None,
            style: PoemStyle::default(),
            tone: default_tone(),
            writer_vibe: None,
            must_include: Vec::new(),
            avoid: Vec::new(),
            line_count: default_line_count(),
            rhyme: false,
            syllable_hints: None,
            no_cliches: true,
            reading_level: ReadingLevel::default(),
            acrostic_word: None,
            person_id: None,
        }
    }

    /// Check field ranges. The reason string feeds a `ValidationError`.
    pub fn validate(&self) -> Result<(), String> {
        if self.theme.trim().is_empty() {
            return Err("theme is required".into());
        }
        if !(2..=60).contains(&self.line_count) {
            return Err(format!("line_count {} out of range 2..=60", self.line_count));
        }
        if self.style == PoemStyle::Acrostic && self.acrostic_word.is_none() {
            return Err("acrostic style requires acrostic_word".into());
        }
        Ok(())
    }
}

// ─── Critique ────────────────────────────────────────────────────────────────

/// Structured evaluation of a draft. Produced by the critic stage, consumed
/// only by the reviser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Critique {
    #[serde(default)]
    pub constraint_issues: Vec<String>,
    #[serde(default)]
    pub cliches_detected: Vec<String>,
    pub imagery_score: u8,
    pub coherence_score: u8,
    pub originality_score: u8,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Critique {
    /// Inline schema description sent to the critic so its JSON matches
    /// what we deserialize.
    pub fn schema_hint() -> &'static str {
        r#"{
  "constraint_issues": ["string"],
  "cliches_detected": ["string"],
  "imagery_score": 1,
  "coherence_score": 1,
  "originality_score": 1,
  "suggestions": ["string"]
}
(scores are integers 1-10)"#
    }

    /// Scores must sit in 1..=10.
    pub fn scores_in_range(&self) -> bool {
        [self.imagery_score, self.coherence_score, self.originality_score]
            .iter()
            .all(|s| (1..=10).contains(s))
    }
}
