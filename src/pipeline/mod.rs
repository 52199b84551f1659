//! Instruction pipeline.
//!
//! An inbound instruction and its saved attachments flow through:
//! 1. `intent`: keyword intent check and attachment selection
//! 2. `extract`: PDF text extraction (per page, capped)
//! 3. `summarizer`: LLM or local heuristic summary
//! 4. `router`: ties the steps together into a `RoutingResult`

pub mod extract;
pub mod intent;
pub mod router;
pub mod summarizer;
pub mod types;

pub use extract::{PdfTextExtractor, TextExtractor};
pub use router::InstructionRouter;
pub use summarizer::Summarizer;
pub use types::{AttachmentCandidate, GeneratedAttachment, RouteOutcome, RoutingResult};
