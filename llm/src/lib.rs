use crate::llm::LLM;

pub mod llm;
pub mod speech;
pub mod vertex;

pub type LLMBox = Box<dyn LLM + Send>;
