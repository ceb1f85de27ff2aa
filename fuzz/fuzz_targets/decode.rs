#![no_main]
use bin_ipc::{decode_header, decode_request, decode_response, Encoder};
use libfuzzer_sys::fuzz_target;

// Decoding arbitrary bytes must never panic, and whatever decodes must
// re-encode without panicking.
fuzz_target!(|data: &[u8]| {
    let (method, parameters) = decode_request(data);
    let _ = decode_header(data);
    let response = decode_response(data);

    let encoder = Encoder::new();
    let _ = encoder.encode_request(&method, &parameters, None);
    let _ = encoder.encode_response(&response);
});
