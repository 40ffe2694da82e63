//! Trailer alias dictionary (C1): a static, load-time table mapping free-form
//! commit-message trailer names to the closed set of canonical trailers.
//!
//! This is data, not logic (Design Notes §9) — the only behavior here is
//! case-insensitive lookup. `std::sync::LazyLock` is used instead of pulling in
//! `once_cell`/`lazy_static`; neither crate is a dependency of the teacher, and
//! the standard library has carried an equivalent primitive since Rust 1.80.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::CanonicalTrailer;

macro_rules! aliases {
    ($($alias:expr => $canon:expr),* $(,)?) => {
        &[$(($alias, $canon)),*]
    };
}

/// Alias table, grouped by canonical trailer for readability. Keys are
/// compared case-insensitively against the `Name` half of a `Name: value`
/// trailer line.
static RAW_ALIASES: &[(&str, CanonicalTrailer)] = aliases! {
    // Signed-off-by
    "signed-off-by" => CanonicalTrailer::SignedOffBy,
    "signedoffby" => CanonicalTrailer::SignedOffBy,
    "signed off by" => CanonicalTrailer::SignedOffBy,
    "signed-off" => CanonicalTrailer::SignedOffBy,
    "sign-off-by" => CanonicalTrailer::SignedOffBy,
    "sob" => CanonicalTrailer::SignedOffBy,
    "s-o-b" => CanonicalTrailer::SignedOffBy,
    "acked-and-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "also-by" => CanonicalTrailer::SignedOffBy,
    "on-behalf-of" => CanonicalTrailer::SignedOffBy,
    "signoff" => CanonicalTrailer::SignedOffBy,
    "signoff-by" => CanonicalTrailer::SignedOffBy,
    "sign-off" => CanonicalTrailer::SignedOffBy,
    "dco-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "certified-by" => CanonicalTrailer::SignedOffBy,
    "endorsed-by" => CanonicalTrailer::SignedOffBy,
    "vouched-by" => CanonicalTrailer::SignedOffBy,
    "author-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "committer-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "co-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "cosigned-off-by" => CanonicalTrailer::SignedOffBy,
    "signed-off-by-proxy" => CanonicalTrailer::SignedOffBy,
    "signed-off-for" => CanonicalTrailer::SignedOffBy,
    "legal-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "gpg-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "sob-by" => CanonicalTrailer::SignedOffBy,
    "sign-off-from" => CanonicalTrailer::SignedOffBy,
    "ack-sob" => CanonicalTrailer::SignedOffBy,
    "dco" => CanonicalTrailer::SignedOffBy,
    "cla-signed-by" => CanonicalTrailer::SignedOffBy,
    "license-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "off-by" => CanonicalTrailer::SignedOffBy,
    "formally-signed-off-by" => CanonicalTrailer::SignedOffBy,
    "attested-by" => CanonicalTrailer::SignedOffBy,
    "signed" => CanonicalTrailer::SignedOffBy,
    "ok-signed-off-by" => CanonicalTrailer::SignedOffBy,

    // Co-authored-by
    "co-authored-by" => CanonicalTrailer::CoAuthoredBy,
    "coauthoredby" => CanonicalTrailer::CoAuthoredBy,
    "co-author" => CanonicalTrailer::CoAuthoredBy,
    "co-author-by" => CanonicalTrailer::CoAuthoredBy,
    "co-developed-by" => CanonicalTrailer::CoAuthoredBy,
    "codeveloped-by" => CanonicalTrailer::CoAuthoredBy,
    "pair-programmed-with" => CanonicalTrailer::CoAuthoredBy,
    "paired-with" => CanonicalTrailer::CoAuthoredBy,
    "contributions-by" => CanonicalTrailer::CoAuthoredBy,
    "with-help-from" => CanonicalTrailer::CoAuthoredBy,
    "co-authored" => CanonicalTrailer::CoAuthoredBy,
    "coauthor" => CanonicalTrailer::CoAuthoredBy,
    "coauthor-by" => CanonicalTrailer::CoAuthoredBy,
    "co-written-by" => CanonicalTrailer::CoAuthoredBy,
    "cowritten-by" => CanonicalTrailer::CoAuthoredBy,
    "jointly-authored-by" => CanonicalTrailer::CoAuthoredBy,
    "joint-work-with" => CanonicalTrailer::CoAuthoredBy,
    "pairing-with" => CanonicalTrailer::CoAuthoredBy,
    "mob-with" => CanonicalTrailer::CoAuthoredBy,
    "mob-programmed-with" => CanonicalTrailer::CoAuthoredBy,
    "ensemble-with" => CanonicalTrailer::CoAuthoredBy,
    "pair-with" => CanonicalTrailer::CoAuthoredBy,
    "collaborated-with" => CanonicalTrailer::CoAuthoredBy,
    "contributed-by" => CanonicalTrailer::CoAuthoredBy,
    "additional-author" => CanonicalTrailer::CoAuthoredBy,
    "additional-author-by" => CanonicalTrailer::CoAuthoredBy,
    "also-authored-by" => CanonicalTrailer::CoAuthoredBy,
    "assisted-by" => CanonicalTrailer::CoAuthoredBy,
    "helped-by" => CanonicalTrailer::CoAuthoredBy,
    "co-writer" => CanonicalTrailer::CoAuthoredBy,
    "shared-authorship-with" => CanonicalTrailer::CoAuthoredBy,
    "thanks-to" => CanonicalTrailer::CoAuthoredBy,
    "credit-to" => CanonicalTrailer::CoAuthoredBy,
    "co-auth" => CanonicalTrailer::CoAuthoredBy,
    "co-auth-by" => CanonicalTrailer::CoAuthoredBy,

    // Reviewed-by
    "reviewed-by" => CanonicalTrailer::ReviewedBy,
    "reviewedby" => CanonicalTrailer::ReviewedBy,
    "review-by" => CanonicalTrailer::ReviewedBy,
    "rb" => CanonicalTrailer::ReviewedBy,
    "code-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "reviewed-on-by" => CanonicalTrailer::ReviewedBy,
    "looks-good-to" => CanonicalTrailer::ReviewedBy,
    "lgtm-by" => CanonicalTrailer::ReviewedBy,
    "lgtm" => CanonicalTrailer::ReviewedBy,
    "review" => CanonicalTrailer::ReviewedBy,
    "reviewer" => CanonicalTrailer::ReviewedBy,
    "reviewed" => CanonicalTrailer::ReviewedBy,
    "peer-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "design-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "security-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "architecture-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "rr" => CanonicalTrailer::ReviewedBy,
    "crb" => CanonicalTrailer::ReviewedBy,
    "r-by" => CanonicalTrailer::ReviewedBy,
    "reviewed-in" => CanonicalTrailer::ReviewedBy,
    "pr-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "mr-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "gerrit-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "shipit-by" => CanonicalTrailer::ReviewedBy,
    "ship-it-by" => CanonicalTrailer::ReviewedBy,
    "double-checked-by" => CanonicalTrailer::ReviewedBy,
    "sanity-checked-by" => CanonicalTrailer::ReviewedBy,
    "proofread-by" => CanonicalTrailer::ReviewedBy,
    "vetted-by" => CanonicalTrailer::ReviewedBy,
    "re-reviewed-by" => CanonicalTrailer::ReviewedBy,
    "final-review-by" => CanonicalTrailer::ReviewedBy,

    // Tested-by
    "tested-by" => CanonicalTrailer::TestedBy,
    "testedby" => CanonicalTrailer::TestedBy,
    "tb" => CanonicalTrailer::TestedBy,
    "qa-by" => CanonicalTrailer::TestedBy,
    "verified-by" => CanonicalTrailer::TestedBy,
    "tested-on-by" => CanonicalTrailer::TestedBy,
    "smoke-tested-by" => CanonicalTrailer::TestedBy,
    "regression-tested-by" => CanonicalTrailer::TestedBy,
    "tested" => CanonicalTrailer::TestedBy,
    "test-by" => CanonicalTrailer::TestedBy,
    "qa-tested-by" => CanonicalTrailer::TestedBy,
    "qa-verified-by" => CanonicalTrailer::TestedBy,
    "validated-by" => CanonicalTrailer::TestedBy,
    "validation-by" => CanonicalTrailer::TestedBy,
    "ci-tested-by" => CanonicalTrailer::TestedBy,
    "manually-tested-by" => CanonicalTrailer::TestedBy,
    "functional-tested-by" => CanonicalTrailer::TestedBy,
    "integration-tested-by" => CanonicalTrailer::TestedBy,
    "unit-tested-by" => CanonicalTrailer::TestedBy,
    "load-tested-by" => CanonicalTrailer::TestedBy,
    "perf-tested-by" => CanonicalTrailer::TestedBy,
    "performance-tested-by" => CanonicalTrailer::TestedBy,
    "field-tested-by" => CanonicalTrailer::TestedBy,
    "beta-tested-by" => CanonicalTrailer::TestedBy,
    "confirmed-working-by" => CanonicalTrailer::TestedBy,
    "works-for" => CanonicalTrailer::TestedBy,
    "reproduced-by" => CanonicalTrailer::TestedBy,
    "repro-by" => CanonicalTrailer::TestedBy,

    // Approved-by
    "approved-by" => CanonicalTrailer::ApprovedBy,
    "approvedby" => CanonicalTrailer::ApprovedBy,
    "ab" => CanonicalTrailer::ApprovedBy,
    "acked-by" => CanonicalTrailer::ApprovedBy,
    "ack-by" => CanonicalTrailer::ApprovedBy,
    "sign-off-approved-by" => CanonicalTrailer::ApprovedBy,
    "merge-approved-by" => CanonicalTrailer::ApprovedBy,
    "release-approved-by" => CanonicalTrailer::ApprovedBy,
    "approved" => CanonicalTrailer::ApprovedBy,
    "approve-by" => CanonicalTrailer::ApprovedBy,
    "ack" => CanonicalTrailer::ApprovedBy,
    "acked" => CanonicalTrailer::ApprovedBy,
    "nack-overridden-by" => CanonicalTrailer::ApprovedBy,
    "sign-off-by-maintainer" => CanonicalTrailer::ApprovedBy,
    "maintainer-approved-by" => CanonicalTrailer::ApprovedBy,
    "owner-approved-by" => CanonicalTrailer::ApprovedBy,
    "lead-approved-by" => CanonicalTrailer::ApprovedBy,
    "pm-approved-by" => CanonicalTrailer::ApprovedBy,
    "product-approved-by" => CanonicalTrailer::ApprovedBy,
    "design-approved-by" => CanonicalTrailer::ApprovedBy,
    "security-approved-by" => CanonicalTrailer::ApprovedBy,
    "compliance-approved-by" => CanonicalTrailer::ApprovedBy,
    "legal-approved-by" => CanonicalTrailer::ApprovedBy,
    "merge-ok-by" => CanonicalTrailer::ApprovedBy,
    "ok-by" => CanonicalTrailer::ApprovedBy,
    "okay-by" => CanonicalTrailer::ApprovedBy,
    "greenlit-by" => CanonicalTrailer::ApprovedBy,
    "signed-off-by-lead" => CanonicalTrailer::ApprovedBy,
    "final-approved-by" => CanonicalTrailer::ApprovedBy,

    // Reported-by
    "reported-by" => CanonicalTrailer::ReportedBy,
    "reportedby" => CanonicalTrailer::ReportedBy,
    "reported" => CanonicalTrailer::ReportedBy,
    "bug-reported-by" => CanonicalTrailer::ReportedBy,
    "found-by" => CanonicalTrailer::ReportedBy,
    "issue-reported-by" => CanonicalTrailer::ReportedBy,
    "originally-reported-by" => CanonicalTrailer::ReportedBy,
    "report-by" => CanonicalTrailer::ReportedBy,
    "bug-found-by" => CanonicalTrailer::ReportedBy,
    "discovered-by" => CanonicalTrailer::ReportedBy,
    "spotted-by" => CanonicalTrailer::ReportedBy,
    "observed-by" => CanonicalTrailer::ReportedBy,
    "first-reported-by" => CanonicalTrailer::ReportedBy,
    "crash-reported-by" => CanonicalTrailer::ReportedBy,
    "regression-reported-by" => CanonicalTrailer::ReportedBy,
    "user-reported-by" => CanonicalTrailer::ReportedBy,
    "customer-reported-by" => CanonicalTrailer::ReportedBy,
    "security-reported-by" => CanonicalTrailer::ReportedBy,
    "vulnerability-reported-by" => CanonicalTrailer::ReportedBy,
    "cve-reported-by" => CanonicalTrailer::ReportedBy,
    "issue-by" => CanonicalTrailer::ReportedBy,
    "filed-by" => CanonicalTrailer::ReportedBy,
    "noted-by" => CanonicalTrailer::ReportedBy,
    "flagged-issue-by" => CanonicalTrailer::ReportedBy,
    "bisected-by" => CanonicalTrailer::ReportedBy,
    "root-caused-by" => CanonicalTrailer::ReportedBy,

    // Informed-by
    "informed-by" => CanonicalTrailer::InformedBy,
    "informedby" => CanonicalTrailer::InformedBy,
    "notified-by" => CanonicalTrailer::InformedBy,
    "cc" => CanonicalTrailer::InformedBy,
    "noticed-by" => CanonicalTrailer::InformedBy,
    "flagged-by" => CanonicalTrailer::InformedBy,
    "informed" => CanonicalTrailer::InformedBy,
    "notify" => CanonicalTrailer::InformedBy,
    "notify-by" => CanonicalTrailer::InformedBy,
    "cc-by" => CanonicalTrailer::InformedBy,
    "cc-to" => CanonicalTrailer::InformedBy,
    "fyi" => CanonicalTrailer::InformedBy,
    "fyi-to" => CanonicalTrailer::InformedBy,
    "attention-to" => CanonicalTrailer::InformedBy,
    "attn" => CanonicalTrailer::InformedBy,
    "notice-to" => CanonicalTrailer::InformedBy,
    "broadcast-to" => CanonicalTrailer::InformedBy,
    "shared-with" => CanonicalTrailer::InformedBy,
    "heads-up-to" => CanonicalTrailer::InformedBy,
    "alerted-by" => CanonicalTrailer::InformedBy,
    "alert-to" => CanonicalTrailer::InformedBy,
    "copied-to" => CanonicalTrailer::InformedBy,
    "mentioned-by" => CanonicalTrailer::InformedBy,
    "watchers" => CanonicalTrailer::InformedBy,

    // Resolved-by
    "resolved-by" => CanonicalTrailer::ResolvedBy,
    "resolvedby" => CanonicalTrailer::ResolvedBy,
    "fixed-by" => CanonicalTrailer::ResolvedBy,
    "fix-by" => CanonicalTrailer::ResolvedBy,
    "closed-by" => CanonicalTrailer::ResolvedBy,
    "patch-by" => CanonicalTrailer::ResolvedBy,
    "resolved" => CanonicalTrailer::ResolvedBy,
    "resolve-by" => CanonicalTrailer::ResolvedBy,
    "fixes-by" => CanonicalTrailer::ResolvedBy,
    "fixed" => CanonicalTrailer::ResolvedBy,
    "bugfix-by" => CanonicalTrailer::ResolvedBy,
    "patched-by" => CanonicalTrailer::ResolvedBy,
    "solved-by" => CanonicalTrailer::ResolvedBy,
    "solution-by" => CanonicalTrailer::ResolvedBy,
    "repaired-by" => CanonicalTrailer::ResolvedBy,
    "workaround-by" => CanonicalTrailer::ResolvedBy,
    "mitigated-by" => CanonicalTrailer::ResolvedBy,
    "closed" => CanonicalTrailer::ResolvedBy,
    "issue-closed-by" => CanonicalTrailer::ResolvedBy,
    "ticket-closed-by" => CanonicalTrailer::ResolvedBy,
    "hotfix-by" => CanonicalTrailer::ResolvedBy,
    "rootcause-fixed-by" => CanonicalTrailer::ResolvedBy,

    // Influenced-by
    "influenced-by" => CanonicalTrailer::InfluencedBy,
    "influencedby" => CanonicalTrailer::InfluencedBy,
    "inspired-by" => CanonicalTrailer::InfluencedBy,
    "suggested-by" => CanonicalTrailer::InfluencedBy,
    "idea-by" => CanonicalTrailer::InfluencedBy,
    "requested-by" => CanonicalTrailer::InfluencedBy,
    "influence-by" => CanonicalTrailer::InfluencedBy,
    "inspiration-by" => CanonicalTrailer::InfluencedBy,
    "inspiration-from" => CanonicalTrailer::InfluencedBy,
    "idea-from" => CanonicalTrailer::InfluencedBy,
    "suggestion-by" => CanonicalTrailer::InfluencedBy,
    "suggested" => CanonicalTrailer::InfluencedBy,
    "proposed-by" => CanonicalTrailer::InfluencedBy,
    "proposal-by" => CanonicalTrailer::InfluencedBy,
    "requested" => CanonicalTrailer::InfluencedBy,
    "request-by" => CanonicalTrailer::InfluencedBy,
    "feature-request-by" => CanonicalTrailer::InfluencedBy,
    "prompted-by" => CanonicalTrailer::InfluencedBy,
    "motivated-by" => CanonicalTrailer::InfluencedBy,
    "design-by" => CanonicalTrailer::InfluencedBy,
    "concept-by" => CanonicalTrailer::InfluencedBy,
    "brainstormed-with" => CanonicalTrailer::InfluencedBy,
    "credit-idea-to" => CanonicalTrailer::InfluencedBy,
    "based-on-idea-by" => CanonicalTrailer::InfluencedBy,

    // Committed-by
    "committed-by" => CanonicalTrailer::CommittedBy,
    "committedby" => CanonicalTrailer::CommittedBy,
    "commit-by" => CanonicalTrailer::CommittedBy,
    "applied-by" => CanonicalTrailer::CommittedBy,
    "merged-by" => CanonicalTrailer::CommittedBy,
    "cherry-picked-by" => CanonicalTrailer::CommittedBy,
    "backported-by" => CanonicalTrailer::CommittedBy,
    "committed" => CanonicalTrailer::CommittedBy,
    "commit" => CanonicalTrailer::CommittedBy,
    "landed-by" => CanonicalTrailer::CommittedBy,
    "pushed-by" => CanonicalTrailer::CommittedBy,
    "applied" => CanonicalTrailer::CommittedBy,
    "merge-by" => CanonicalTrailer::CommittedBy,
    "merged" => CanonicalTrailer::CommittedBy,
    "rebased-by" => CanonicalTrailer::CommittedBy,
    "rebased" => CanonicalTrailer::CommittedBy,
    "cherry-pick-by" => CanonicalTrailer::CommittedBy,
    "cherrypicked-by" => CanonicalTrailer::CommittedBy,
    "backport-by" => CanonicalTrailer::CommittedBy,
    "backported" => CanonicalTrailer::CommittedBy,
    "integrated-by" => CanonicalTrailer::CommittedBy,
    "submitted-by" => CanonicalTrailer::CommittedBy,
    "squashed-by" => CanonicalTrailer::CommittedBy,
    "imported-by" => CanonicalTrailer::CommittedBy,
    "committer" => CanonicalTrailer::CommittedBy,
    "land-by" => CanonicalTrailer::CommittedBy,
};

/// Case-insensitive alias → canonical trailer(s) lookup table.
///
/// A handful of aliases are intentionally ambiguous between two canonical
/// trailers in real-world history (e.g. `cc` is sometimes used for review
/// rather than plain notification); those are folded in as multi-entries.
static ALIAS_TABLE: LazyLock<HashMap<String, Vec<CanonicalTrailer>>> = LazyLock::new(|| {
    let mut table: HashMap<String, Vec<CanonicalTrailer>> = HashMap::new();
    for (alias, canon) in RAW_ALIASES {
        table
            .entry(alias.to_ascii_lowercase())
            .or_default()
            .push(*canon);
    }
    table
});

/// Look up the canonical trailer(s) a raw header name maps to, if any.
pub fn lookup(name: &str) -> Option<&'static [CanonicalTrailer]> {
    ALIAS_TABLE.get(&name.to_ascii_lowercase()).map(|v| v.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_off_by_resolves() {
        assert_eq!(lookup("Signed-off-by"), Some(&[CanonicalTrailer::SignedOffBy][..]));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("CO-AUTHORED-BY"), Some(&[CanonicalTrailer::CoAuthoredBy][..]));
    }

    #[test]
    fn unknown_alias_returns_none() {
        assert_eq!(lookup("Not-A-Real-Trailer"), None);
    }

    #[test]
    fn acked_by_maps_to_approved() {
        assert_eq!(lookup("acked-by"), Some(&[CanonicalTrailer::ApprovedBy][..]));
    }
}
