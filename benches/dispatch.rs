use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use portico::{
    handler_fn, App, FieldSpec, HttpEventBuilder, Outcome, ParamSpec, Route, TypeSchema,
};
use serde_json::{json, Value};

fn example_app() -> App {
    let echo = || {
        handler_fn(|_req, args| Ok(Outcome::Json(Value::Object(args.0))))
    };

    App::builder()
        .route(Route::get("/").handler(echo()))
        .route(Route::get("/zoo/animals").handler(echo()))
        .route(Route::post("/zoo/animals").handler(echo()))
        .route(
            Route::get("/zoo/animals/{id:int}")
                .param(ParamSpec::path("id", TypeSchema::integer()))
                .param(ParamSpec::query("verbose", TypeSchema::boolean()).default_value(false))
                .handler(echo()),
        )
        .route(
            Route::get("/zoo/animals/{id:int}/toys/{toy_id:int}")
                .param(ParamSpec::path("id", TypeSchema::integer()))
                .param(ParamSpec::path("toy_id", TypeSchema::integer()))
                .handler(echo()),
        )
        .route(
            Route::get("/zoo/{category}/animals/{id:int}/habitats/{habitat_id:int}")
                .param(ParamSpec::path("category", TypeSchema::string()))
                .param(ParamSpec::path("id", TypeSchema::integer()))
                .param(ParamSpec::path("habitat_id", TypeSchema::integer()))
                .handler(echo()),
        )
        .route(
            Route::queue("orders")
                .param(ParamSpec::body(
                    "order",
                    TypeSchema::object([FieldSpec::required("sku", TypeSchema::string())]),
                ))
                .handler(echo()),
        )
        .build()
        .expect("benchmark app builds")
}

fn bench_http_dispatch(c: &mut Criterion) {
    let app = example_app();
    let events: Vec<Value> = [
        "/zoo/animals",
        "/zoo/animals/123?verbose=true",
        "/zoo/animals/123/toys/456",
        "/zoo/cats/animals/123/habitats/88",
    ]
    .iter()
    .map(|path| HttpEventBuilder::get(path).build())
    .collect();

    c.bench_function("http_dispatch", |b| {
        b.iter(|| {
            for event in &events {
                black_box(app.handle(event.clone()));
            }
        })
    });
}

fn bench_queue_batch(c: &mut Criterion) {
    let app = example_app();
    let records: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "messageId": format!("msg-{i}"),
                "body": json!({"sku": format!("sku-{i}")}).to_string(),
                "eventSource": "aws:sqs",
                "eventSourceARN": "arn:aws:sqs:us-east-1:123456789012:orders",
            })
        })
        .collect();
    let event = json!({ "Records": records });

    c.bench_function("queue_batch_10", |b| {
        b.iter(|| black_box(app.handle(event.clone())))
    });
}

criterion_group!(benches, bench_http_dispatch, bench_queue_batch);
criterion_main!(benches);
