#![no_main]
use bin_ipc::FrameAssembler;
use libfuzzer_sys::fuzz_target;

// Feeding arbitrary bytes in arbitrary chunkings must never panic, and a
// chunked feed must agree with a whole-buffer feed.
fuzz_target!(|input: (Vec<u8>, u8)| {
    let (data, step) = input;
    let step = usize::from(step).max(1);

    let mut whole = FrameAssembler::new();
    let whole_result = whole.process(&data);

    let mut chunked = FrameAssembler::new();
    let mut chunked_err = None;
    'outer: for chunk in data.chunks(step) {
        let mut offset = 0;
        while offset < chunk.len() && !chunked.is_finished() {
            match chunked.process(&chunk[offset..]) {
                Ok(consumed) => offset += consumed,
                Err(e) => {
                    chunked_err = Some(e);
                    break 'outer;
                }
            }
        }
        if chunked.is_finished() {
            break;
        }
    }

    match whole_result {
        Ok(_) => {
            assert_eq!(chunked.is_finished(), whole.is_finished());
            if whole.is_finished() {
                assert_eq!(chunked.data(), whole.data());
            }
        }
        Err(e) => assert_eq!(chunked_err, Some(e)),
    }
});
