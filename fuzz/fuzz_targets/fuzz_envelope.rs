#![no_main]
use std::io::Read;

use fiks_cms::enveloped::EnvelopeDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(decoder) = EnvelopeDecoder::new(data) else {
        return;
    };
    let _ = decoder.header().key_transport_recipients().count();
    if let Ok(mut content) = decoder.into_content() {
        let mut sink = Vec::new();
        let _ = content.read_to_end(&mut sink);
    }
});
