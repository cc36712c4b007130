//! Property tests for node name translation.

use proptest::prelude::*;

use kubesrc::domain::value_objects::{parse_node_name, parse_node_num, NodeName};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: `node-N` always maps to `n(N-1)` and back.
    #[test]
    fn property_user_name_maps_to_previous_ordinal(n in 1usize..100_000) {
        let user = format!("node-{n}");
        prop_assert_eq!(parse_node_num(&user).unwrap(), n - 1);
        prop_assert_eq!(parse_node_name(&user).unwrap(), format!("n{}", n - 1));

        let node = NodeName::parse(&user).unwrap();
        prop_assert_eq!(node.alias(), user);
        prop_assert_eq!(NodeName::parse(&node.to_string()).unwrap(), node);
    }

    /// PROPERTY: anything outside `node-N` (N >= 1) is rejected, never panics.
    #[test]
    fn property_malformed_names_are_rejected(s in "[a-z0-9_+-]{0,12}") {
        let well_formed = s
            .strip_prefix("node-")
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse::<usize>().ok())
            .is_some_and(|n| n >= 1);
        prop_assert_eq!(parse_node_num(&s).is_ok(), well_formed);
    }
}

#[test]
fn node_zero_is_invalid() {
    assert!(parse_node_num("node-0").is_err());
    assert!(parse_node_name("node-0").is_err());
}
