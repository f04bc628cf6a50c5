#![no_main]

use libfuzzer_sys::fuzz_target;

use hearth_skill::Request;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(request) = serde_json::from_str::<Request>(input) else {
        return;
    };
    // Anything that decodes must re-encode and decode to the same value.
    let encoded = serde_json::to_string(&request).expect("decoded request must re-encode");
    let reparsed: Request =
        serde_json::from_str(&encoded).expect("re-encoded request must decode");
    assert_eq!(reparsed, request);
});
