use chrono::{Datelike, Utc};
use uuid::Uuid;

/// Human-facing reference numbers: `PREFIX-YEAR-suffix`. The suffix is drawn
/// from UUID entropy; the schema's unique columns are the real uniqueness
/// guarantee.
pub fn reference_number(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..6].to_ascii_uppercase();
    format!("{prefix}-{}-{suffix}", Utc::now().year())
}

pub fn requisition_number() -> String {
    reference_number("REQ")
}

pub fn quote_number() -> String {
    reference_number("QUO")
}

pub fn po_number() -> String {
    reference_number("PO")
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Utc};

    use super::{po_number, quote_number, requisition_number};

    #[test]
    fn numbers_carry_prefix_and_current_year() {
        let year = Utc::now().year().to_string();

        for (number, prefix) in [
            (requisition_number(), "REQ"),
            (quote_number(), "QUO"),
            (po_number(), "PO"),
        ] {
            let parts: Vec<&str> = number.split('-').collect();
            assert_eq!(parts.len(), 3, "unexpected shape: {number}");
            assert_eq!(parts[0], prefix);
            assert_eq!(parts[1], year);
            assert_eq!(parts[2].len(), 6);
        }
    }

    #[test]
    fn consecutive_numbers_differ() {
        assert_ne!(requisition_number(), requisition_number());
    }
}
