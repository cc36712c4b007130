#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

use kubesrc::{Scenario, UserOverrides};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let path = Path::new("fuzz.yaml");
        let _ = Scenario::from_yaml(path, content);
        if let Ok(overrides) = UserOverrides::from_yaml(path, content) {
            for key in overrides.rest.keys().filter_map(|k| k.as_str()) {
                let _ = overrides.service(key);
            }
        }
    }
});
