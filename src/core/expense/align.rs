// Positional alignment of model output to the source batch.

use super::models::{EmailRecord, ExpenseRecord};

/// Reconciles the candidate list against the source emails, index by index.
///
/// The output always has exactly one record per source email: missing
/// candidates become empty records, extra candidates are dropped, and a
/// record with a blank date inherits the date of the email at the same
/// position. There is no content-based matching - if the model reorders
/// entries they stay reordered, and only the position decides which email
/// a record belongs to.
pub fn align_to_source(candidates: &[ExpenseRecord], emails: &[EmailRecord]) -> Vec<ExpenseRecord> {
    emails
        .iter()
        .enumerate()
        .map(|(index, email)| {
            let mut record = candidates.get(index).cloned().unwrap_or_default();
            if record.date.trim().is_empty() {
                record.date = email.date.clone();
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(date: &str) -> EmailRecord {
        EmailRecord {
            date: date.to_string(),
            sender: "shop@example.com".to_string(),
            message: "receipt".to_string(),
        }
    }

    fn expense(date: &str, amount: &str) -> ExpenseRecord {
        ExpenseRecord {
            date: date.to_string(),
            amount: amount.to_string(),
            category: "Food".to_string(),
            description: "lunch".to_string(),
        }
    }

    #[test]
    fn output_length_always_matches_the_source() {
        let emails = vec![email("2024-01-01"), email("2024-01-02"), email("2024-01-03")];

        for candidate_count in [0, 1, 3, 5] {
            let candidates: Vec<ExpenseRecord> = (0..candidate_count)
                .map(|i| expense("2024-02-01", &format!("${}", i)))
                .collect();
            let aligned = align_to_source(&candidates, &emails);
            assert_eq!(aligned.len(), emails.len(), "candidates: {}", candidate_count);
        }
    }

    #[test]
    fn records_stay_at_their_positions() {
        let emails = vec![email("2024-01-01"), email("2024-01-02")];
        let candidates = vec![expense("2024-03-01", "$1"), expense("2024-03-02", "$2")];

        let aligned = align_to_source(&candidates, &emails);
        assert_eq!(aligned[0].amount, "$1");
        assert_eq!(aligned[1].amount, "$2");
    }

    #[test]
    fn extra_candidates_are_dropped() {
        let emails = vec![email("2024-01-01")];
        let candidates = vec![expense("", "$1"), expense("", "$2")];

        let aligned = align_to_source(&candidates, &emails);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].amount, "$1");
    }

    #[test]
    fn blank_dates_are_backfilled_from_the_source_email() {
        let emails = vec![email("2024-01-01"), email("2024-01-02")];
        let candidates = vec![expense("", "$1"), expense("  ", "$2")];

        let aligned = align_to_source(&candidates, &emails);
        assert_eq!(aligned[0].date, "2024-01-01");
        assert_eq!(aligned[1].date, "2024-01-02");
    }

    #[test]
    fn present_dates_are_not_overwritten() {
        let emails = vec![email("2024-01-01")];
        let candidates = vec![expense("2024-03-15", "$1")];

        let aligned = align_to_source(&candidates, &emails);
        assert_eq!(aligned[0].date, "2024-03-15");
    }

    #[test]
    fn missing_candidates_become_empty_records_with_the_email_date() {
        let emails = vec![email("2024-01-01"), email("2024-01-02")];
        let candidates = vec![expense("2024-03-01", "$1")];

        let aligned = align_to_source(&candidates, &emails);
        assert_eq!(aligned[1].date, "2024-01-02");
        assert_eq!(aligned[1].amount, "");
        assert_eq!(aligned[1].category, "");
        assert_eq!(aligned[1].description, "");
    }

    #[test]
    fn empty_source_batch_yields_empty_output() {
        let aligned = align_to_source(&[expense("", "$1")], &[]);
        assert!(aligned.is_empty());
    }
}
