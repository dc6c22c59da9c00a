#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = fiks_utils::asn1::Decoder::new(data);
    while !decoder.is_empty() {
        if decoder.read_tlv().is_err() {
            break;
        }
    }

    let mut reader = fiks_utils::asn1::BerReader::new(data);
    while reader.skip_element().is_ok() {}
});
