//! Mail summarizer: inbound email webhook that summarizes attached PDFs and
//! replies by email.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;

#[cfg(test)]
mod test_support;
