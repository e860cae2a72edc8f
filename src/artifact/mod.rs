//! Artifact pipeline: find the diagram the agent claims to have written,
//! bring it into the output directory, and render the design report.
//!
//! ```text
//! agent reply ──► extract ──► materialize ──► assemble ──► report
//! ```

pub mod extract;
pub mod materialize;
pub mod report;

pub use extract::{extract_artifact_path, find_by_extension, SAVE_SENTINEL};
pub use materialize::{ArtifactMaterializer, Filesystem, MaterializeOutcome, StdFilesystem};
pub use report::{append_saved_location, assemble_report, report_file_name};
