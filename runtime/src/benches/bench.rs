use criterion::criterion_main;

mod decode;

criterion_main!(spans::benches, decode::benches);
