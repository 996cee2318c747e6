//! render_json.rs: JSON rendering of the report model.
//!
//! Field order follows the model's struct layout; the output is meant for
//! display tools, not for hashing (artifacts are hashed in canonical form by
//! the pipeline).

use crate::{ReportError, ReportModel};

/// Pretty-printed JSON with a trailing newline.
pub fn render_json(model: &ReportModel) -> Result<String, ReportError> {
    let mut s = serde_json::to_string_pretty(model).map_err(|_| ReportError::Render("json_serialize"))?;
    s.push('\n');
    Ok(s)
}
