#![no_main]

use libfuzzer_sys::fuzz_target;
use txtap_protocol::{AddrPayload, InventoryAnnouncement, Payload, PingPayload, VersionPayload};

fuzz_target!(|data: &[u8]| {
    // Every payload decoder must reject malformed input without panicking.
    let _ = VersionPayload::from_bytes(data);
    let _ = PingPayload::from_bytes(data);
    let _ = AddrPayload::from_bytes(data);

    // Whatever decodes as an inventory re-decodes to the same hashes.
    if let Ok(inv) = InventoryAnnouncement::from_bytes(data) {
        let again = InventoryAnnouncement::from_bytes(&inv.to_bytes()).unwrap();
        assert_eq!(again.hashes(), inv.hashes());
    }
});
