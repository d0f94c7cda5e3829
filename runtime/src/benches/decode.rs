use bytes::Bytes;
use criterion::{criterion_group, BatchSize, Criterion};
use prometheus_client::registry::Registry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use slipstream_codec::{encode, Struct, Type, Value};
use slipstream_runtime::{
    pool::BufferPool, read_record, source::MemorySource, transport::Config, NZUsize,
};

/// Builds a struct with `fields` fields of mixed types.
fn sample(rng: &mut StdRng, fields: usize) -> Struct {
    let fields = (1..=fields as i16)
        .map(|id| {
            let value = match id % 4 {
                0 => Value::I64(rng.gen()),
                1 => Value::Binary(Bytes::from(vec![b'x'; rng.gen_range(1..64)])),
                2 => Value::List {
                    element: Type::I32,
                    items: (0..16).map(|_| Value::I32(rng.gen())).collect(),
                },
                _ => Value::Double(rng.gen()),
            };
            (id, value)
        })
        .collect();
    Struct { fields }
}

fn bench_decode(c: &mut Criterion) {
    let pool = BufferPool::new(Default::default(), &mut Registry::default());
    let mut rng = StdRng::seed_from_u64(0);
    for fields in [10, 100, 1000] {
        let encoded = encode(&sample(&mut rng, fields)).unwrap().freeze();
        for chunk_size in [256, 64 * 1024] {
            c.bench_function(
                &format!(
                    "{}/fields={} chunk={}",
                    module_path!(),
                    fields,
                    chunk_size
                ),
                |b| {
                    b.iter_batched(
                        || MemorySource::new(encoded.clone(), NZUsize!(chunk_size)),
                        |mut source| {
                            read_record::<Struct, _>(&mut source, &pool, &Config::default())
                                .unwrap()
                        },
                        BatchSize::SmallInput,
                    );
                },
            );
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_decode
}
