// The resume analysis pipeline:
// upload → document (rasterize + encode) → evaluator (one Gemini call) → page / download.
// All model calls go through llm_client.

pub mod document;
pub mod evaluator;
pub mod handlers;
pub mod rasterizer;
pub mod session;
pub mod views;
pub mod workflow;
