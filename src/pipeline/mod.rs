mod schema;

pub use schema::{Critique, PoemRequest, PoemStyle, ReadingLevel};

use crate::config::ModelConfig;
use crate::error::{InvocationError, Result, VerseError};
use crate::prompt::{PromptStore, Stage};
use crate::providers::Provider;
use tracing::{debug, info};

// ─── State machine ───────────────────────────────────────────────────────────

/// Where a run currently stands. Transitions are strictly linear; any stage
/// failure halts the run where it is and nothing downstream executes. This is
/// deliberately a fixed sequence, not a workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Generated,
    Critiqued,
    Revised,
    Done,
}

/// Output of a full generate → critique → revise run.
#[derive(Debug, Clone)]
pub struct FullRun {
    pub draft: String,
    pub critique: Critique,
    pub revised: String,
}

/// Output of an improvement pass over an existing poem.
#[derive(Debug, Clone)]
pub struct ImproveRun {
    pub critique: Critique,
    pub improved: String,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// The three-stage generation pipeline. Holds references only; one instance
/// can serve many runs.
pub struct Pipeline<'a> {
    provider: &'a dyn Provider,
    prompts: &'a PromptStore,
    params: &'a ModelConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(provider: &'a dyn Provider, prompts: &'a PromptStore, params: &'a ModelConfig) -> Self {
        Self {
            provider,
            prompts,
            params,
        }
    }

    /// Full run: Start → Generated → Critiqued → Revised → Done.
    pub async fn run_full(&self, request: &PoemRequest, user_memory: &str) -> Result<FullRun> {
        let mut state = PipelineState::Start;

        let draft = self.generate(request, user_memory).await?;
        state = self.advance(state, PipelineState::Generated);

        let critique = self.critique(request, &draft).await?;
        state = self.advance(state, PipelineState::Critiqued);

        let revised = self.revise(request, &draft, &critique, user_memory).await?;
        state = self.advance(state, PipelineState::Revised);

        self.advance(state, PipelineState::Done);
        info!(theme = %request.theme, "pipeline run complete");
        Ok(FullRun {
            draft,
            critique,
            revised,
        })
    }

    /// Improvement pass: re-enters at the critic with an existing poem as
    /// the draft. Start → Critiqued → Revised → Done.
    pub async fn run_improve(
        &self,
        request: &PoemRequest,
        poem: &str,
        user_memory: &str,
    ) -> Result<ImproveRun> {
        let mut state = PipelineState::Start;

        let critique = self.critique(request, poem).await?;
        state = self.advance(state, PipelineState::Critiqued);

        let improved = self.revise(request, poem, &critique, user_memory).await?;
        state = self.advance(state, PipelineState::Revised);

        self.advance(state, PipelineState::Done);
        info!(theme = %request.theme, "improvement pass complete");
        Ok(ImproveRun { critique, improved })
    }

    fn advance(&self, from: PipelineState, to: PipelineState) -> PipelineState {
        debug!(?from, ?to, "pipeline transition");
        to
    }

    // ── Stages ──────────────────────────────────────────────────────────

    async fn generate(&self, request: &PoemRequest, user_memory: &str) -> Result<String> {
        let ctx = Self::request_context(request, user_memory);
        let prompt = self.prompts.render(Stage::Generator, &ctx)?;
        let text = self
            .provider
            .chat(&prompt.system, &prompt.user, self.params)
            .await?;
        Ok(text.trim().to_string())
    }

    async fn critique(&self, request: &PoemRequest, poem: &str) -> Result<Critique> {
        let constraints =
            serde_json::to_string(request).map_err(|e| VerseError::Other(e.into()))?;
        let mut ctx = tera::Context::new();
        ctx.insert("schema", Critique::schema_hint());
        ctx.insert("constraints", &constraints);
        ctx.insert("poem", poem);

        let prompt = self.prompts.render(Stage::Critic, &ctx)?;
        let raw = self
            .provider
            .chat(&prompt.system, &prompt.user, self.params)
            .await?;
        let critique = parse_critique(&raw)?;
        Ok(critique)
    }

    async fn revise(
        &self,
        request: &PoemRequest,
        poem: &str,
        critique: &Critique,
        user_memory: &str,
    ) -> Result<String> {
        let mut ctx = Self::request_context(request, user_memory);
        ctx.insert("poem", poem);
        ctx.insert(
            "critique",
            &serde_json::to_string_pretty(critique).map_err(|e| VerseError::Other(e.into()))?,
        );

        let prompt = self.prompts.render(Stage::Reviser, &ctx)?;
        let text = self
            .provider
            .chat(&prompt.system, &prompt.user, self.params)
            .await?;
        Ok(text.trim().to_string())
    }

    /// Template variables shared by the generator and reviser stages.
    fn request_context(request: &PoemRequest, user_memory: &str) -> tera::Context {
        let mut ctx = tera::Context::new();
        ctx.insert("theme", &request.theme);
        ctx.insert("occasion", &request.occasion);
        ctx.insert("audience", &request.audience);
        ctx.insert("style", request.style.as_str());
        ctx.insert("tone", &request.tone);
        ctx.insert("writer_vibe", &request.writer_vibe);
        ctx.insert("must_include", &request.must_include);
        ctx.insert("avoid", &request.avoid);
        ctx.insert("line_count", &request.line_count);
        ctx.insert("rhyme", &request.rhyme);
        ctx.insert("syllable_hints", &request.syllable_hints);
        ctx.insert("no_cliches", &request.no_cliches);
        ctx.insert("reading_level", request.reading_level.as_str());
        ctx.insert("acrostic_word", &request.acrostic_word);
        let memory = if user_memory.trim().is_empty() {
            "None"
        } else {
            user_memory
        };
        ctx.insert("user_memory", memory);
        ctx
    }
}

/// Parse the critic's JSON, tolerating a fenced code block around it.
fn parse_critique(raw: &str) -> std::result::Result<Critique, InvocationError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);

    let critique: Critique = serde_json::from_str(body)
        .map_err(|e| InvocationError::Malformed(format!("critique json: {e}")))?;
    if !critique.scores_in_range() {
        return Err(InvocationError::Malformed(
            "critique scores out of range 1..=10".into(),
        ));
    }
    Ok(critique)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CRITIQUE: &str = r#"{
        "constraint_issues": ["too long"],
        "cliches_detected": [],
        "imagery_score": 7,
        "coherence_score": 8,
        "originality_score": 6,
        "suggestions": ["tighten the final couplet"]
    }"#;

    #[test]
    fn parse_critique_plain_json() {
        let critique = parse_critique(VALID_CRITIQUE).unwrap();
        assert_eq!(critique.constraint_issues, vec!["too long"]);
        assert_eq!(critique.imagery_score, 7);
    }

    #[test]
    fn parse_critique_fenced_json() {
        let fenced = format!("```json\n{VALID_CRITIQUE}\n```");
        let critique = parse_critique(&fenced).unwrap();
        assert_eq!(critique.coherence_score, 8);
    }

    #[test]
    fn parse_critique_rejects_prose() {
        let err = parse_critique("A lovely poem, well done.").unwrap_err();
        assert!(matches!(err, InvocationError::Malformed(_)));
    }

    #[test]
    fn parse_critique_rejects_out_of_range_scores() {
        let raw = r#"{"imagery_score": 0, "coherence_score": 5, "originality_score": 5}"#;
        let err = parse_critique(raw).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn request_context_defaults_empty_memory_to_none() {
        let req = PoemRequest::new("rivers");
        let ctx = Pipeline::request_context(&req, "   ");
        assert_eq!(ctx.get("user_memory").unwrap().as_str().unwrap(), "None");
    }
}
