//! Language-model analysis of gathered company signals.
//!
//! [`LeadAnalyst`] owns the prompts and reply interpretation; the model itself
//! is any [`ChatModel`], normally [`AzureOpenAi`].

mod analyst;
mod model;
pub mod prompts;

pub use analyst::{AreaAssessment, Assessment, LeadAnalyst, Verdict};
pub use model::{AzureOpenAi, ChatModel};
