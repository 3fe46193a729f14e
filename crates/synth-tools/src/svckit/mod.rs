//! Service Kit - Research Tools
//!
//! Tools that implement `synth_core::Tool` for the research assistant.

mod analyze_document;
mod explain_concept;
mod notes;
mod web_search;

pub use analyze_document::{ANALYSIS_CHAR_LIMIT, AnalysisType, AnalyzeDocumentTool};
pub use explain_concept::ExplainConceptTool;
pub use notes::{ListNotesTool, SaveNoteTool};
pub use web_search::{DEFAULT_NUM_RESULTS, WebSearchTool};
