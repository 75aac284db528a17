//! Ownership registry: binds externally managed resources to local accounts
//! through a marker tag embedded in the resource's tag string.
//!
//! Proxmox stores tags as one free-text string, semicolon-delimited (commas
//! also appear in the wild). Ownership is decided by exact token membership
//! after tokenisation, never by substring containment: the marker for
//! account 1 is a textual prefix of the marker for account 10, so a raw
//! `contains` check would hand account 1 access to account 10's resources.

use crate::types::AccountId;

/// Tag prefix identifying the owner marker.
pub const MARKER_PREFIX: &str = "owner:";

/// The marker tag for an account, e.g. `owner:42`.
pub fn marker_for(account_id: AccountId) -> String {
    format!("{MARKER_PREFIX}{account_id}")
}

/// Split a raw tag string into discrete, trimmed, non-empty tokens.
fn tokens(tags: &str) -> impl Iterator<Item = &str> {
    tags.split([';', ','])
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Whether the exact marker for `account_id` appears as a discrete tag.
pub fn owns(tags: &str, account_id: AccountId) -> bool {
    let marker = marker_for(account_id);
    tokens(tags).any(|t| t == marker)
}

/// Whether any marker-prefixed token is present, regardless of whose and
/// regardless of whether its suffix parses. A malformed marker still means
/// "somebody wrote a marker here" and must not invite a second one.
pub fn has_owner(tags: &str) -> bool {
    tokens(tags).any(|t| t.starts_with(MARKER_PREFIX))
}

/// The owning account, if a well-formed marker tag is present. Malformed
/// markers (non-numeric suffix) are ignored rather than treated as owned.
pub fn owner_of(tags: &str) -> Option<AccountId> {
    tokens(tags)
        .filter_map(|t| t.strip_prefix(MARKER_PREFIX))
        .find_map(|id| id.parse::<AccountId>().ok())
}

/// Compose the tag string for a new resource: the owner marker first, then
/// the caller's comma-separated tags, joined with the Proxmox delimiter.
/// Marker-prefixed tokens in the caller's tags are dropped, so the marker
/// written here is always the only one in the result.
pub fn with_marker_added(account_id: AccountId, extra_tags: Option<&str>) -> String {
    let mut all = vec![marker_for(account_id)];
    if let Some(extra) = extra_tags {
        all.extend(
            tokens(extra)
                .filter(|t| !t.starts_with(MARKER_PREFIX))
                .map(String::from),
        );
    }
    all.join(";")
}

/// Append a marker to an existing tag string, preserving what is there.
/// Used by the claim bootstrapper on resources that have no marker yet.
pub fn with_marker_appended(tags: &str, account_id: AccountId) -> String {
    let mut all: Vec<String> = tokens(tags).map(String::from).collect();
    all.push(marker_for(account_id));
    all.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_prefix_plus_decimal_id() {
        assert_eq!(marker_for(1), "owner:1");
        assert_eq!(marker_for(42), "owner:42");
    }

    #[test]
    fn owns_requires_exact_token_match() {
        assert!(owns("owner:1", 1));
        assert!(owns("web;owner:1;prod", 1));
        assert!(owns(" owner:1 ; web ", 1));
        assert!(!owns("owner:2", 1));
        assert!(!owns("", 1));
        assert!(!owns("web;prod", 1));
    }

    #[test]
    fn account_one_does_not_own_account_tens_resources() {
        // The substring hazard: "owner:1" is a prefix of "owner:10".
        assert!(!owns("owner:10", 1));
        assert!(!owns("owner:11;web", 1));
        assert!(owns("owner:10", 10));
        // And the reverse direction, a suffix collision.
        assert!(!owns("owner:21", 1));
    }

    #[test]
    fn comma_delimited_tags_are_tokenised_too() {
        assert!(owns("web,owner:7,prod", 7));
        assert!(!owns("web,owner:70", 7));
    }

    #[test]
    fn owner_of_finds_the_marker() {
        assert_eq!(owner_of("web;owner:3;prod"), Some(3));
        assert_eq!(owner_of("web;prod"), None);
        assert_eq!(owner_of(""), None);
        // A malformed marker resolves to nobody in particular...
        assert_eq!(owner_of("owner:abc"), None);
    }

    #[test]
    fn any_marker_prefixed_token_counts_as_owned() {
        assert!(has_owner("owner:12"));
        // ...but it still blocks a second marker from being written.
        assert!(has_owner("owner:abc;web"));
        assert!(has_owner("owner:;web"));
        assert!(!has_owner("web;prod"));
        assert!(!has_owner(""));
        // Prefix check is on whole tokens, not substrings.
        assert!(!has_owner("disowner:3"));
    }

    #[test]
    fn with_marker_added_puts_owner_first() {
        assert_eq!(with_marker_added(5, None), "owner:5");
        assert_eq!(with_marker_added(5, Some("web, prod")), "owner:5;web;prod");
        assert_eq!(with_marker_added(5, Some("")), "owner:5");
    }

    #[test]
    fn caller_tags_cannot_smuggle_in_a_marker() {
        // A tenant naming another account's marker must not grant that
        // account ownership or charge its quota.
        let tags = with_marker_added(5, Some("web,owner:10"));
        assert_eq!(tags, "owner:5;web");
        assert!(owns(&tags, 5));
        assert!(!owns(&tags, 10));
        assert_eq!(owner_of(&tags), Some(5));

        // The caller's own marker is not duplicated either.
        assert_eq!(with_marker_added(5, Some("owner:5;web")), "owner:5;web");
        // Malformed markers are stripped like any other.
        assert_eq!(with_marker_added(5, Some("owner:abc")), "owner:5");
    }

    #[test]
    fn with_marker_appended_preserves_existing_tags() {
        assert_eq!(with_marker_appended("web;prod", 9), "web;prod;owner:9");
        assert_eq!(with_marker_appended("", 9), "owner:9");
    }

    #[test]
    fn round_trip_add_then_owns() {
        for id in [1, 7, 10, 100, 9999] {
            let tags = with_marker_added(id, Some("a,b"));
            assert!(owns(&tags, id));
            assert!(!owns(&tags, id + 1));
            assert_eq!(owner_of(&tags), Some(id));
        }
    }
}
