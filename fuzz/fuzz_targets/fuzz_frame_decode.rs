#![no_main]

use libfuzzer_sys::fuzz_target;
use txtap_protocol::{build_frame, decode_frame, ChecksumPolicy};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the frame decoder, in either mode.
    let _ = decode_frame(data, ChecksumPolicy::Permissive);

    let Ok((frame, consumed)) = decode_frame(data, ChecksumPolicy::Strict) else {
        return;
    };
    assert!(consumed <= data.len());

    // Lossy command names (invalid UTF-8) may not fit the field again.
    if let Ok(rebuilt) = build_frame(frame.header.magic, &frame.header.command, Some(&frame.payload)) {
        let (again, used) = decode_frame(&rebuilt, ChecksumPolicy::Strict).unwrap();
        assert_eq!(used, rebuilt.len());
        assert_eq!(again.header.command, frame.header.command);
        assert_eq!(again.payload, frame.payload);
    }
});
