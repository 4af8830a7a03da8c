use bencher::{form_cases, json_cases};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_gateway::body::BodyReader;
use micro_gateway::codec::{ContentKind, FormDecoder, FormValue, JsonDecoder};
use micro_gateway::protocol::{BodyChunk, MultiMap, ReceiveEvent};
use std::hint::black_box;
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 16 * 1024;
const MAX_SIZE: usize = 64 * 1024 * 1024;

fn benchmark_form_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("form_decoder");

    for case in form_cases() {
        let kind = ContentKind::from_content_type(Some(case.content_type())).expect("fixture content type is valid");
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let mut form = MultiMap::<FormValue>::new();
                let mut decoder = FormDecoder::new(&kind, MAX_SIZE).expect("fixture is a form");
                for chunk in case.chunks(CHUNK_SIZE) {
                    decoder.write(chunk, &mut form).expect("fixture should be a valid form");
                }
                decoder.finalize(&mut form).expect("fixture should be a complete form");
                black_box(form);
            });
        });
    }

    group.finish();
}

fn benchmark_json_decoder(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should start");
    let mut group = criterion.benchmark_group("json_decoder");

    for case in json_cases() {
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched(
                || {
                    let (tx, rx) = mpsc::unbounded_channel::<ReceiveEvent>();
                    for chunk in case.chunks(CHUNK_SIZE) {
                        tx.send(ReceiveEvent::from(BodyChunk::new(chunk.to_vec(), true))).expect("receiver is alive");
                    }
                    tx.send(ReceiveEvent::from(BodyChunk::last(""))).expect("receiver is alive");
                    rx
                },
                |mut rx| {
                    let value = runtime.block_on(async {
                        let mut reader = BodyReader::new(&mut rx);
                        JsonDecoder::new().with_max_size(MAX_SIZE).decode(&mut reader).await
                    });
                    black_box(value.expect("fixture should be valid json"));
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_form_decoder, benchmark_json_decoder);
criterion_main!(decoder);
