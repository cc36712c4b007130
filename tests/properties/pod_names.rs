//! Property tests for pod naming and matching.

use proptest::prelude::*;

use kubesrc::domain::value_objects::{gen_pod_name, pod_matches, pod_node, NodeName};

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the node of a generated pod name is the node it was generated for.
    #[test]
    fn property_pod_node_inverts_gen_pod_name(
        release in segment(),
        service in proptest::collection::vec(segment(), 1..=3),
        ordinal in 0usize..64,
    ) {
        let node = NodeName::from_ordinal(ordinal);
        let pod = gen_pod_name(&release, &service.join("-"), node);
        prop_assert_eq!(pod_node(&pod).unwrap(), node);
    }

    /// PROPERTY: a pod always matches any dash-separated prefix of its own name.
    #[test]
    fn property_pod_matches_own_prefix(
        parts in proptest::collection::vec(segment(), 1..=5),
        cut in 0usize..5,
    ) {
        let name = parts.join("-");
        let prefix = parts[..cut.min(parts.len())].join("-");
        prop_assert!(pod_matches(&prefix, &name));
        prop_assert!(pod_matches(&name, &name));
    }
}
