//! Markdown design report.

use std::path::Path;

use chrono::NaiveDateTime;

pub const REPORT_TITLE: &str = "AWS CloudWAN Architecture Design";
pub const REPORT_PREFIX: &str = "aws_design";
pub const REPORT_EXTENSION: &str = "md";

/// Shown in place of the image when no diagram could be materialized.
pub const DIAGRAM_MISSING_NOTICE: &str = "*Diagram generation failed or file not found*";

const NEXT_STEPS: [&str; 5] = [
    "Review the architecture design above",
    "Validate the design meets your specific requirements",
    "Use the implementation guide to deploy the infrastructure",
    "Test connectivity and security controls",
    "Monitor performance and costs",
];

/// Render the report.
///
/// Sections always appear in the same order: title and timestamp, query,
/// diagram, design details (the agent reply, unmodified), next steps. The
/// image is referenced by file name only so the report stays valid next to
/// the diagram; the full path is recorded separately.
pub fn assemble_report(
    query: &str,
    response: &str,
    artifact: Option<&Path>,
    generated_at: NaiveDateTime,
) -> String {
    let mut content = format!(
        "# {title}\n\n**Generated on:** {generated}\n\n**Query:** {query}\n\n## Architecture Diagram\n",
        title = REPORT_TITLE,
        generated = generated_at.format("%Y-%m-%d %H:%M:%S"),
        query = query,
    );

    match artifact {
        Some(path) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            content.push_str(&format!("![AWS CloudWAN Architecture]({})\n\n", file_name));
            content.push_str(&format!("**Diagram Location:** `{}`\n\n", path.display()));
        }
        None => {
            content.push_str(DIAGRAM_MISSING_NOTICE);
            content.push_str("\n\n");
        }
    }

    content.push_str("## Design Details and Implementation Guide\n\n");
    content.push_str(response);
    content.push_str("\n\n---\n\n## Next Steps\n\n");
    for (i, step) in NEXT_STEPS.iter().enumerate() {
        content.push_str(&format!("{}. {}\n", i + 1, step));
    }

    content
}

/// `aws_design_<YYYYMMDD_HHMMSS>.md`
pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        REPORT_PREFIX,
        generated_at.format("%Y%m%d_%H%M%S"),
        REPORT_EXTENSION
    )
}

/// Record where the report itself was written. Applied after rendering,
/// once the target path is known.
pub fn append_saved_location(report: &mut String, report_path: &Path) {
    report.push_str(&format!(
        "\n**Documentation saved at:** `{}`\n",
        report_path.display()
    ));
}
