use crate::refinement::RefinementHistory;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

/// Version table for the refinement loop. The active row is marked with `*`.
pub fn format_history_text(history: &RefinementHistory) -> String {
    if history.is_empty() {
        return "No versions yet.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Version", "From", "Prompt", "Created"]);
    for (index, entry) in history.entries().iter().enumerate() {
        let marker = if history.active_index() == Some(index) { "*" } else { "" };
        let base = entry
            .base_index
            .map(|b| format!("v{}", b))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            marker.to_string(),
            format!("v{}", index),
            base,
            entry.prompt.clone(),
            entry.created_at.clone(),
        ]);
    }
    format!("Epoch {}\n{}", history.epoch(), table)
}
