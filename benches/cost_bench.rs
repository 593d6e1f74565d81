//! Cost accounting performance benchmarks

use aiplayground::config::AppConfig;
use aiplayground::models::openai::WireUsage;
use aiplayground::models::{SessionDuration, SessionKey, StreamEvent, Usage};
use aiplayground::services::board::ResponseBoard;
use aiplayground::services::usage::{compute_cost, normalize_usage, CostBreakdown};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn config() -> AppConfig {
    AppConfig::from_json(
        r#"{"providers": [{"id": "openai", "provider": "openai", "baseUrl": "https://api.openai.com/v1", "apiKey": "k",
            "models": [{"id": "m1", "name": "gpt-4o-mini", "inputTokenPrice": 0.15, "outputTokenPrice": 0.6}]}]}"#,
    )
    .unwrap()
}

/// Benchmark: Usage normalization and cost
fn bench_compute_cost(c: &mut Criterion) {
    let config = config();
    let model = &config.providers[0].models[0];
    let wire = WireUsage {
        prompt_tokens: Some(1200),
        completion_tokens: Some(350),
        total_tokens: None,
    };

    c.bench_function("normalize_and_cost", |b| {
        b.iter(|| {
            let usage = normalize_usage(black_box(wire)).unwrap();
            black_box(compute_cost(&usage, model))
        })
    });

    let usage = Usage::new(1200, 350, 1550);
    c.bench_function("cost_breakdown_display", |b| {
        b.iter(|| black_box(CostBreakdown::from_usage(&usage, model, black_box(1000)).map(|c| c.to_string())))
    });
}

/// Benchmark: Folding a dispatch's events into the board
fn bench_board_apply(c: &mut Criterion) {
    let config = config();
    let key = SessionKey::new("openai", "m1");
    let mut events: Vec<StreamEvent> = (0..200).map(|i| StreamEvent::fragment(&key, format!("tok{} ", i))).collect();
    events.push(StreamEvent::finished(
        &key,
        Some(Usage::new(1200, 350, 1550)),
        SessionDuration {
            total: 3.2,
            first_token: Some(0.4),
        },
    ));

    c.bench_function("board_apply", |b| {
        b.iter(|| {
            let mut board = ResponseBoard::new(&config.providers, 1000);
            for event in &events {
                board.apply(black_box(event));
            }
            black_box(board.is_settled())
        })
    });
}

criterion_group!(benches, bench_compute_cost, bench_board_apply);
criterion_main!(benches);
