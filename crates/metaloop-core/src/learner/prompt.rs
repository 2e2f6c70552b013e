//! Prompts for the two learner calls.

use std::fmt::Write as _;

use metaloop_types::audit::{AuditEvent, AuditRecord, GeneratorEvent};

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You analyse search-result titles and meta \
descriptions together with their measured click-through performance. You find phrasing \
patterns that explain the difference between pages whose click-through improved and pages \
whose click-through did not. You only report patterns that are visible in the examples.";

pub const REWRITE_SYSTEM_PROMPT: &str = "You maintain the quality-guidance section of a \
system prompt used to write meta descriptions. You update it with new guidance while \
keeping its structure, headings and tone. Reply with the full updated section as markdown \
and nothing else.";

/// One example line per tracker record.
fn render_tracked(out: &mut String, record: &AuditRecord) {
    let AuditEvent::Tracker(event) = &record.event else {
        return;
    };
    let attrs = event.attributes();
    let ctr = attrs
        .current_ctr
        .map_or_else(|| "n/a".to_string(), |c| format!("{:.2}%", c * 100.0));
    let _ = writeln!(
        out,
        "- Page: {}\n  Title: {}\n  Description: {}\n  CTR: {ctr} ({} vs baseline, {} impressions)",
        attrs.page, attrs.title, attrs.description, attrs.improvement, attrs.impressions,
    );
}

fn render_failure(out: &mut String, record: &AuditRecord) {
    let AuditEvent::Generator(GeneratorEvent::GenerationFailed {
        attempts,
        last_reason,
        failures,
    }) = &record.event
    else {
        return;
    };
    let _ = writeln!(out, "- Page: {} ({attempts} attempts)", record.scope);
    for failure in failures {
        let _ = writeln!(out, "  Attempt {}: {}", failure.attempt, failure.reason);
    }
    if failures.is_empty() {
        let _ = writeln!(out, "  Last reason: {last_reason}");
    }
}

/// Analysis prompt with at most `per_category` examples of each kind.
pub fn build_analysis_prompt(
    high: &[AuditRecord],
    low: &[AuditRecord],
    failures: &[AuditRecord],
    per_category: usize,
) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "## High performers ({} total, showing up to {per_category})\n",
        high.len()
    );
    high.iter().take(per_category).for_each(|r| render_tracked(&mut out, r));

    let _ = writeln!(
        out,
        "\n## No improvement ({} total, showing up to {per_category})\n",
        low.len()
    );
    if low.is_empty() {
        out.push_str("(none recorded)\n");
    }
    low.iter().take(per_category).for_each(|r| render_tracked(&mut out, r));

    if !failures.is_empty() {
        let _ = writeln!(
            out,
            "\n## Generation failures ({} total, showing up to {per_category})\n",
            failures.len()
        );
        failures
            .iter()
            .take(per_category)
            .for_each(|r| render_failure(&mut out, r));
    }

    out.push_str("\n## Goals\n\n");
    out.push_str("1. Identify phrasing patterns common to the high performers.\n");
    out.push_str("2. Identify mistakes common to the pages with no improvement.\n");
    out.push_str("3. Write concrete, actionable instructions that would improve the generation prompt.\n");
    if !failures.is_empty() {
        out.push_str(
            "4. Explain the root causes of why generation fails for certain pages, as failure insights.\n",
        );
    }
    out.push_str(
        "\nFor each pattern give a description, a short example taken from the data, the \
         estimated impact as a click-through multiplier (1.0 means no effect), and your \
         confidence between 0 and 1. Order patterns from strongest to weakest.",
    );
    out
}

/// Second call: rewrite the quality layer around the new guidance.
pub fn build_rewrite_prompt(current_quality: &str, instructions: &str, insights: &[String]) -> String {
    let mut out = String::new();
    out.push_str("Current quality guidance, verbatim:\n\n<current>\n");
    out.push_str(current_quality);
    if !current_quality.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</current>\n\nNew improvement instructions:\n\n");
    out.push_str(instructions.trim());
    out.push('\n');

    if !insights.is_empty() {
        out.push_str("\nWhy generation has been failing for some pages:\n\n");
        for insight in insights {
            let _ = writeln!(out, "- {insight}");
        }
    }

    out.push_str(
        "\nProduce the updated quality guidance. Keep the existing structure and any guidance \
         that is still valid, and integrate the new instructions where they belong.",
    );
    out
}
