use criterion::{black_box, criterion_group, criterion_main, Criterion};
use conversion_dashboard::analytics::summarize;
use conversion_dashboard::chart::{build_chart, components};
use conversion_dashboard::dataset::{EventRecord, EventTable, GroupingKey};
use conversion_dashboard::formatter::format_percentage;

const CHANNELS: [&str; 5] = ["Email", "Facebook", "House Ads", "Instagram", "Push"];
const AGES: [&str; 7] = [
    "0-18 years",
    "19-24 years",
    "24-30 years",
    "30-36 years",
    "36-45 years",
    "45-55 years",
    "55+ years",
];

fn synthetic_table(rows: usize) -> EventTable {
    let records = (0..rows)
        .map(|i| {
            EventRecord::new(
                format!("a{:07}", i % (rows / 3).max(1)),
                i % 7 == 0,
                CHANNELS[i % CHANNELS.len()],
                CHANNELS[(i / 3) % CHANNELS.len()],
                AGES[i % AGES.len()],
            )
        })
        .collect();
    EventTable::new(records)
}

fn aggregation_benchmark(c: &mut Criterion) {
    let table = synthetic_table(10_000);

    c.bench_function("summarize_marketing_channel_10k", |b| {
        b.iter(|| {
            let summary = summarize(black_box(&table), GroupingKey::MarketingChannel);
            black_box(summary.rows.len());
        });
    });

    c.bench_function("summarize_age_group_10k", |b| {
        b.iter(|| {
            let summary = summarize(black_box(&table), GroupingKey::AgeGroup);
            black_box(summary.total_converted);
        });
    });
}

fn chart_benchmark(c: &mut Criterion) {
    let summary = summarize(&synthetic_table(1_000), GroupingKey::AgeGroup);

    c.bench_function("build_and_render_chart", |b| {
        b.iter(|| {
            let spec = build_chart(black_box(&summary), "age_group");
            let parts = components(&spec).expect("chart renders");
            black_box(parts.div.len());
        });
    });
}

fn formatter_benchmark(c: &mut Criterion) {
    c.bench_function("format_percentage", |b| {
        b.iter(|| black_box(format_percentage(black_box(0.6789))));
    });
}

criterion_group!(
    benches,
    aggregation_benchmark,
    chart_benchmark,
    formatter_benchmark
);
criterion_main!(benches);
