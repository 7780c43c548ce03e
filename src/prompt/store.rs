use crate::error::PromptError;
use tera::Tera;

// ─── Stage templates ─────────────────────────────────────────────────────────

const GENERATOR_SYSTEM: &str = "\
You are a skilled poet writing on commission. You follow the requested form
exactly: style, line count, tone, and reading level are constraints, not
suggestions.{% if no_cliches %} Avoid stock phrases and greeting-card cliches.{% endif %}
What you know about the reader:
{{ user_memory }}";

const GENERATOR_USER: &str = "\
Write a poem.

Theme: {{ theme }}
Occasion: {{ occasion }}
Style: {{ style }}
Tone: {{ tone }}
{% if audience %}Audience: {{ audience }}
{% endif %}{% if writer_vibe %}Voice to channel: {{ writer_vibe }}
{% endif %}Target length: about {{ line_count }} lines.
Rhyme: {% if rhyme %}yes{% else %}no{% endif %}.
Reading level: {{ reading_level }}.
{% if syllable_hints %}Syllable guidance: {{ syllable_hints }}
{% endif %}{% if acrostic_word %}Acrostic word (first letters of lines): {{ acrostic_word }}
{% endif %}{% if must_include %}Must include: {{ must_include | join(sep=\", \") }}.
{% endif %}{% if avoid %}Avoid mentioning: {{ avoid | join(sep=\", \") }}.
{% endif %}
Return only the poem text, no commentary.";

const CRITIC_SYSTEM: &str = "\
You are an exacting poetry editor. You evaluate a draft against its
constraints and respond with structured JSON only.";

const CRITIC_USER: &str = "\
Evaluate this draft against the constraints below. Respond with a single JSON
object matching this schema and nothing else:

{{ schema }}

Constraints: {{ constraints }}

Poem:
{{ poem }}

Return only valid JSON.";

const REVISER_SYSTEM: &str = "\
You are a poet revising your own draft after an editor's notes. Keep what
works, fix what the critique flags, and stay inside the original constraints.
What you know about the reader:
{{ user_memory }}";

const REVISER_USER: &str = "\
Revise the poem below. Address every issue in the critique while preserving
the theme ({{ theme }}), style ({{ style }}), tone ({{ tone }}), and target
length of {{ line_count }} lines.

Critique:
{{ critique }}

Poem:
{{ poem }}

Return only the revised poem text, no commentary.";

/// All blocks that must be present for the store to load. Checked once at
/// startup; a per-call miss is impossible afterwards.
const REQUIRED: [(&str, &str); 6] = [
    ("generator.system", GENERATOR_SYSTEM),
    ("generator.user", GENERATOR_USER),
    ("critic.system", CRITIC_SYSTEM),
    ("critic.user", CRITIC_USER),
    ("reviser.system", REVISER_SYSTEM),
    ("reviser.user", REVISER_USER),
];

// ─── Store ───────────────────────────────────────────────────────────────────

/// A pipeline stage with a fixed role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generator,
    Critic,
    Reviser,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Critic => "critic",
            Self::Reviser => "reviser",
        }
    }
}

/// A fully rendered system+user prompt pair for one stage.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Immutable template store, loaded once at process start and shared by
/// reference thereafter.
pub struct PromptStore {
    tera: Tera,
}

impl PromptStore {
    /// Register and validate every required block.
    pub fn load() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        for (name, content) in REQUIRED {
            if content.trim().is_empty() {
                return Err(PromptError::MissingTemplate(name.to_string()));
            }
            tera.add_raw_template(name, content)
                .map_err(|e| PromptError::Render(format!("{name}: {e}")))?;
        }
        Ok(Self { tera })
    }

    /// Render both blocks of a stage with the given context.
    pub fn render(&self, stage: Stage, ctx: &tera::Context) -> Result<RenderedPrompt, PromptError> {
        let system = self.render_block(&format!("{}.system", stage.name()), ctx)?;
        let user = self.render_block(&format!("{}.user", stage.name()), ctx)?;
        Ok(RenderedPrompt { system, user })
    }

    fn render_block(&self, name: &str, ctx: &tera::Context) -> Result<String, PromptError> {
        self.tera
            .render(name, ctx)
            .map_err(|e| PromptError::Render(format!("{name}: {e}")))
    }
}
