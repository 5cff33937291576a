//! Pipeline stages from raw parser output to a translated document.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! archive ──▶ normalize ──▶ poll ──▶ translate ──▶ reconstruct
//! (ZIP→JSON)  (4 shapes)   (3 s ×120) (batches of 10) (concat | substitute)
//!                                        │
//!                                    postprocess (LLM output cleanup)
//! ```
//!
//! 1. [`archive`]     — unpack the result ZIP, locate the structured JSON
//! 2. [`normalize`]   — heterogeneous JSON → canonical [`crate::TextBlock`]s
//! 3. [`poll`]        — fixed-interval job polling with an attempt budget
//! 4. [`translate`]   — sequential batch orchestration, continue-on-error
//! 5. [`reconstruct`] — translated full text from translated blocks
//! 6. [`postprocess`] — deterministic cleanup of raw model answers

pub mod archive;
pub mod normalize;
pub mod poll;
pub mod postprocess;
pub mod reconstruct;
pub mod translate;
