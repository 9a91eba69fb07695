//! Test support: scripted collaborators and a fixture-grade tokenizer.

mod mocks;
mod tokenizer;

pub use mocks::{FetchRecord, ScriptedFetchClient, ScriptedPage, ScriptedProbe};
pub use tokenizer::SimpleTokenizer;
