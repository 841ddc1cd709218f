use divan::counter::BytesCount;
use divan::{AllocProfiler, Bencher, black_box_drop};
use meshmon_protocol::cursor::XdrCursor;
use meshmon_protocol::message::MetricMessage;
use meshmon_protocol::value::MetricValue;
use meshmon_protocol::wire::FromWire;
use meshmon_protocol::{Protocol, ToWire};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn sample_message() -> MetricMessage {
    MetricMessage::new(
        "node-17.cluster.example",
        "cpu_user",
        MetricValue::Float(12.5),
        "%",
        1_700_000_000,
        60,
        0,
    )
}

#[divan::bench(min_time = 0.250)]
fn decode(bencher: Bencher) {
    let raw = sample_message().encode(Protocol::Xdr).unwrap();

    bencher
        .counter(BytesCount::new(raw.len()))
        .with_inputs(|| raw.clone())
        .bench_local_refs(|data| {
            let mut cursor = XdrCursor::new(data);
            black_box_drop(MetricMessage::from_wire(&mut cursor).unwrap())
        })
}

#[allow(clippy::unit_arg)]
#[divan::bench(min_time = 0.250)]
fn encode(bencher: Bencher) {
    let msg = sample_message();

    bencher
        .with_inputs(|| vec![0u8; msg.wire_size()])
        .bench_local_refs(|buf| {
            let mut cursor = XdrCursor::new(buf);
            black_box_drop(msg.to_wire(&mut cursor).unwrap())
        })
}
