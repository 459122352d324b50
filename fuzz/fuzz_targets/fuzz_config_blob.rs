//! Fuzz target: stored configuration blob
//!
//! Decodes arbitrary bytes as the postcard blob the configuration store
//! reads from flash, then validates it.  Neither step may panic, and a
//! blob that validates must re-encode and decode to the same value.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use heatbus::config::NodeConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = postcard::from_bytes::<NodeConfig>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let bytes = postcard::to_allocvec(&cfg).expect("valid config encodes");
    let back: NodeConfig = postcard::from_bytes(&bytes).expect("own encoding decodes");
    assert_eq!(back, cfg);
});
