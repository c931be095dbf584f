use criterion::{Criterion, criterion_group, criterion_main};
use prediction_sync::parse_frame;
use prediction_sync::state::TickerStore;
use std::hint::black_box;

const FRAME: &str = r#"{"e":"24hrTicker","E":1620000000123,"s":"BNBUSDT","p":"-12.50000000","P":"-2.150","w":"575.31200000","x":"581.20000000","c":"568.70000000","Q":"0.42000000","b":"568.60000000","B":"11.30000000","a":"568.80000000","A":"3.05000000","o":"581.20000000","h":"590.00000000","l":"560.10000000","v":"1234567.89000000","q":"710203040.12000000","O":1619913600123,"C":1620000000123,"F":100,"L":200,"n":101}"#;

fn parse_and_store(store: &TickerStore) {
    if let Ok(tick) = parse_frame(black_box(FRAME)) {
        store.set_ticker_data("bnbusdt", tick);
    }
}

fn benchmark_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalizer");

    group.bench_function("parse_frame", |b| b.iter(|| parse_frame(black_box(FRAME))));

    let store = TickerStore::new();
    group.bench_function("parse_and_store", |b| b.iter(|| parse_and_store(&store)));
    group.finish();
}

criterion_group!(benches, benchmark_normalizer);
criterion_main!(benches);
