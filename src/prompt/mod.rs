mod store;

pub use store::{PromptStore, RenderedPrompt, Stage};
