//! Extension-keyed authoring hints.
//!
//! A table-driven mapping from extension sets to instruction strings; new
//! file types get a row, not another branch.

use std::path::Path;

/// (extensions, instruction) rows consulted in order.
const HINT_TABLE: &[(&[&str], &str)] = &[
    (
        &["ts", "tsx", "js", "jsx"],
        "- Use TypeScript with proper types\n- Use React best practices (hooks, functional components)",
    ),
    (
        &["py"],
        "- Use type hints\n- Follow PEP 8\n- Use async/await for API routes",
    ),
    (
        &["json"],
        "- Return valid JSON only\n- Use proper formatting",
    ),
    (
        &["css", "scss"],
        "- Use modern CSS practices\n- Include responsive design",
    ),
];

/// Authoring instructions for a file path, selected by extension.
///
/// Files without a matching extension get no extra guidance.
pub fn instructions_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    for (extensions, hint) in HINT_TABLE {
        if extensions.contains(&ext) {
            return hint;
        }
    }
    ""
}
