#![no_main]

use libfuzzer_sys::fuzz_target;

use kubesrc::domain::value_objects::{parse_node_num, pod_matches, pod_node};

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        let _ = parse_node_num(name);
        let _ = pod_node(name);
        let _ = pod_matches(name, "dev-oneclient-krakow-0");
    }
});
