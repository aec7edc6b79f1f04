//! Canonical status labels.
//!
//! Source systems spell statuses in many ways (`in_progress`, `IN PROGRESS`,
//! `In Progress `). Every comparison and histogram in the crate goes through
//! [`normalize_status`] so those collapse into one bucket.

pub const UNKNOWN: &str = "Unknown";
pub const COMPLETED: &str = "Completed";
pub const IN_PROGRESS: &str = "In Progress";
pub const NOT_STARTED: &str = "Not Started";

const CLOSED: [&str; 2] = [COMPLETED, "Archived"];

pub fn normalize_status(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN.to_string();
    };
    let text = raw.replace('_', " ");
    let text = text.trim();
    if text.is_empty() {
        return UNKNOWN.to_string();
    }
    title_case(text)
}

/// Closed projects are `Completed` or `Archived`; everything else counts as
/// active. Expects a canonical label.
pub fn is_active(label: &str) -> bool {
    !CLOSED.contains(&label)
}

pub fn is_completed(raw: Option<&str>) -> bool {
    normalize_status(raw) == COMPLETED
}

// Uppercase a letter that follows a non-letter, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_blank_are_unknown() {
        assert_eq!(normalize_status(None), "Unknown");
        assert_eq!(normalize_status(Some("")), "Unknown");
        assert_eq!(normalize_status(Some("  _ ")), "Unknown");
    }

    #[test]
    fn spellings_collapse_to_one_label() {
        for raw in ["in_progress", "IN PROGRESS", " In Progress ", "in progress"] {
            assert_eq!(normalize_status(Some(raw)), "In Progress", "{raw}");
        }
        assert_eq!(normalize_status(Some("on-hold")), "On-Hold");
        assert_eq!(normalize_status(Some("not_started")), "Not Started");
    }

    #[test]
    fn only_completed_and_archived_are_closed() {
        assert!(!is_active("Completed"));
        assert!(!is_active("Archived"));
        assert!(is_active("In Progress"));
        assert!(is_active("Unknown"));
        // canonical form only
        assert!(is_active("completed"));
        assert!(is_completed(Some("COMPLETED")));
    }
}
