#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary tails must decode to a container, no container, or an error
fuzz_target!(|data: &[u8]| {
    if let Ok(Some(decoded)) = damd::container::decode(data) {
        assert!(decoded.original_size <= data.len() as u64);
        for segment in decoded.segments.values() {
            assert!(segment.materialize().is_ok());
        }
    }
});
