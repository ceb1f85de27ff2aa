use bin_ipc::{decode_request, decode_response, Encoder, FrameAssembler, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn request_wire() -> Vec<u8> {
    Encoder::new().encode_request(
        "updateDevice",
        &[
            Value::Int64(140231),
            Value::Int32(77),
            Value::Array(vec![
                Value::Int32(12),
                Value::String("living-room/lamp".to_owned()),
                Value::Struct(
                    [
                        ("brightness".to_owned(), Value::Int32(80)),
                        ("on".to_owned(), Value::Bool(true)),
                        ("temperature".to_owned(), Value::Float(21.5)),
                    ]
                    .into_iter()
                    .collect(),
                ),
            ]),
        ],
        None,
    )
}

pub fn codec(c: &mut Criterion) {
    c.bench_function("encode_request", |b| {
        b.iter(|| black_box(request_wire()));
    });

    c.bench_function("decode_request", |b| {
        let wire = request_wire();
        b.iter(|| black_box(decode_request(&wire)));
    });

    c.bench_function("decode_response", |b| {
        let wire = Encoder::new().encode_response(&Value::Array(vec![
            Value::Int64(140231),
            Value::Int32(77),
            Value::String("ok".to_owned()),
        ]));
        b.iter(|| black_box(decode_response(&wire)));
    });
}

pub fn framing(c: &mut Criterion) {
    c.bench_function("assemble_whole_frame", |b| {
        let wire = request_wire();
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            assembler.process(&wire).unwrap();
            black_box(assembler.take_frame())
        });
    });

    c.bench_function("assemble_chunked_frame", |b| {
        let wire = request_wire();
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            for chunk in wire.chunks(16) {
                let mut offset = 0;
                while offset < chunk.len() {
                    offset += assembler.process(&chunk[offset..]).unwrap();
                }
            }
            black_box(assembler.take_frame())
        });
    });
}

criterion_group!(benches, codec, framing);
criterion_main!(benches);
