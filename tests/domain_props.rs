//! Property-based tests for human IDs, date filters and upload naming.

use chrono::{Duration, TimeZone, Utc};
use edcontrols_cli::domain::{format_size, parse_relative_at, upload_name, DateFilterSet, HumanId};
use proptest::prelude::*;

/// Backend identifiers: 32 lowercase hex characters
fn arb_remote_id() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{32}").unwrap()
}

/// Strings too short to be truncated
fn arb_short() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9]{0,5}").unwrap()
}

proptest! {
    #[test]
    fn short_inputs_encode_to_uppercase(s in arb_short()) {
        let encoded = HumanId::encode(&s);
        prop_assert_eq!(encoded.as_str(), s.to_uppercase());
    }

    #[test]
    fn encoded_ids_are_six_uppercase_hex_chars(id in arb_remote_id()) {
        let human = HumanId::encode(&id);
        prop_assert_eq!(human.as_str().len(), 6);
        prop_assert!(human
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn encoding_reads_the_tail_backwards(id in arb_remote_id()) {
        let human = HumanId::encode(&id);
        let tail: String = id[26..].chars().rev().collect();
        prop_assert_eq!(human.as_str(), tail.to_uppercase());
    }

    #[test]
    fn typed_input_matches_its_record(id in arb_remote_id()) {
        let typed = HumanId::from_input(&HumanId::encode(&id).as_str().to_lowercase());
        prop_assert!(typed.matches(&id));
    }

    #[test]
    fn relative_days_subtract_whole_days(n in 0u32..5000) {
        let now = Utc.with_ymd_and_hms(2026, 5, 17, 8, 30, 0).unwrap();
        let parsed = parse_relative_at(&format!("{}d", n), now).unwrap();
        prop_assert_eq!(parsed, now - Duration::days(i64::from(n)));
    }

    #[test]
    fn unknown_units_are_rejected(n in 0u32..1000, unit in "[a-ce-lnp-vxz]") {
        let input = format!("{}{}", n, unit);
        prop_assert!(parse_relative_at(&input, Utc::now()).is_err());
    }

    #[test]
    fn empty_timestamps_fail_closed(days in 1i64..400, which in 0usize..4) {
        let bound = Utc::now() - Duration::days(days);
        let mut filters = DateFilterSet::default();
        match which {
            0 => filters.created_after = Some(bound),
            1 => filters.created_before = Some(bound),
            2 => filters.modified_after = Some(bound),
            _ => filters.modified_before = Some(bound),
        }
        let stamp = Utc::now().to_rfc3339();
        let (created, modified) =
            if which < 2 { ("", stamp.as_str()) } else { (stamp.as_str(), "") };
        prop_assert!(!filters.matches_dates(created, modified));
    }

    #[test]
    fn created_after_splits_on_the_bound(age in 0i64..1000, cutoff in 1i64..1000) {
        prop_assume!(age != cutoff);
        let now = Utc::now();
        let filters = DateFilterSet {
            created_after: Some(now - Duration::days(cutoff)),
            ..DateFilterSet::default()
        };
        let created = (now - Duration::days(age)).to_rfc3339();
        prop_assert_eq!(filters.matches_dates(&created, ""), age < cutoff);
    }

    #[test]
    fn upload_names_keep_the_extension(
        stem in "[a-z0-9 _]{1,20}",
        ext in "(pdf|png|jpg)",
        millis in 0i64..4_000_000_000_000,
    ) {
        let name = upload_name(&format!("{}.{}", stem, ext), millis);
        let expected_suffix = format!("-{}.{}", millis, ext);
        prop_assert!(name.starts_with(&stem));
        prop_assert!(name.ends_with(&expected_suffix));
    }

    #[test]
    fn sizes_below_one_kilobyte_are_plain_bytes(bytes in 0u64..1024) {
        prop_assert_eq!(format_size(bytes), format!("{} B", bytes));
    }

    #[test]
    fn larger_sizes_use_one_decimal(bytes in 1024u64..u64::MAX / 2) {
        let formatted = format_size(bytes);
        prop_assert!(formatted.ends_with("B"));
        prop_assert!(formatted.contains('.'));
    }
}
