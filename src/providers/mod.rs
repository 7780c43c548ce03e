mod openai;
mod traits;

pub use openai::OpenAiProvider;
pub use traits::Provider;
