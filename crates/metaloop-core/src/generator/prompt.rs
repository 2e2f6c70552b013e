//! User-message construction for one generation attempt.

use std::fmt::Write as _;

use metaloop_types::candidate::Candidate;
use metaloop_types::generation::Attempt;

/// Page text beyond this many characters is cut.
pub const PAGE_TEXT_LIMIT: usize = 4000;

/// Build the user message for the next attempt.
///
/// `history` holds every rejection from the current run of this candidate
/// and is replayed in full on each retry.
pub fn build_user_prompt(
    candidate: &Candidate,
    history: &[Attempt],
    min_length: usize,
    max_length: usize,
) -> String {
    let mut out = String::new();
    out.push_str("Write a new title and meta description for this page.\n\n");
    let _ = writeln!(out, "URL: {}", candidate.url);

    match candidate.baseline.usable_ctr() {
        Some(ctr) => {
            let _ = writeln!(
                out,
                "Current performance: {:.2}% CTR over {} impressions",
                ctr * 100.0,
                candidate.baseline.impressions
            );
        }
        None => {
            let _ = writeln!(
                out,
                "Current performance: no clicks recorded ({} impressions)",
                candidate.baseline.impressions
            );
        }
    }
    if let Some(title) = &candidate.current_title {
        let _ = writeln!(out, "Current title: {title}");
    }
    if let Some(description) = &candidate.current_description {
        let _ = writeln!(out, "Current description: {description}");
    }

    if let Some(text) = candidate.page_text.as_deref().filter(|t| !t.trim().is_empty()) {
        out.push_str("\nPage content:\n");
        out.extend(text.trim().chars().take(PAGE_TEXT_LIMIT));
        out.push('\n');
    }

    if !candidate.prior_failures.is_empty() {
        out.push_str("\nA previous run could not produce acceptable text for this page. Its rejections:\n");
        for failure in &candidate.prior_failures {
            let _ = writeln!(out, "- Attempt {}: {}", failure.attempt, failure.reason);
        }
    }

    if !history.is_empty() {
        out.push_str("\nYour earlier attempts for this page were rejected:\n");
        for attempt in history {
            let _ = writeln!(out, "\nAttempt {}:", attempt.attempt);
            if let Some(generated) = &attempt.generated {
                let _ = writeln!(out, "  Title: {}", generated.title);
                let _ = writeln!(out, "  Description: {}", generated.description);
            }
            let _ = writeln!(out, "  Rejected because: {}", attempt.reason);
        }
        out.push_str(
            "\nWrite something fundamentally different, not a minor edit of the rejected versions.\n",
        );
    }

    let _ = write!(
        out,
        "\nThe description must be between {min_length} and {max_length} characters."
    );
    out
}
