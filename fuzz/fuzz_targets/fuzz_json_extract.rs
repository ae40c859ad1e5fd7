//! Fuzz target: flat-JSON field extraction
//!
//! Feeds arbitrary text to the extractor and the status parser and checks:
//! - No panics on any input, including multi-byte UTF-8
//! - An extracted string never contains a quote
//! - An extracted integer appears in the input as decimal text
//!
//! cargo fuzz run fuzz_json_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use otam::app::model::FirmwareDescriptor;
use otam::json::{extract_int, extract_string};

const KEYS: [&str; 6] = [
    "deviceStatus",
    "firmwareFileId",
    "firmwareId",
    "firmwareName",
    "firmwareVersion",
    "firmwareSize",
];

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    for key in KEYS {
        if let Some(s) = extract_string(text, key) {
            assert!(!s.contains('"'), "string value ran past its closing quote");
        }
        if let Some(n) = extract_int(text, key) {
            // Leading zeros aside, the digits are taken verbatim.
            assert!(text.contains(&n.to_string()));
        }
    }

    if let Some(fw) = FirmwareDescriptor::from_status(text) {
        assert_eq!(extract_int(text, "firmwareSize"), Some(fw.size));
        assert_eq!(extract_string(text, "firmwareVersion"), Some(fw.version.as_str()));
    }
});
