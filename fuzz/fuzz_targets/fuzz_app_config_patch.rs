#![no_main]

use libfuzzer_sys::fuzz_target;

use kubesrc::domain::services::patch_attributes;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Must terminate on unbalanced terms and unclosed strings
        let pairs = vec![
            ("op_worker_cacerts_dir".to_string(), "/tmp/cacerts".to_string()),
            ("onepanel_app_config_file".to_string(), "/tmp/app.config".to_string()),
        ];
        let _ = patch_attributes(content, &pairs);
    }
});
