//! Parameter extraction and validation, observed through HTTP events.
//!
//! Covers every literal source (path, query, header, cookie, body), the
//! accumulate-then-reject contract, and the body embedding convention.

use portico::{App, FieldSpec, HttpEventBuilder, ParamSpec, Route, TypeSchema};
use serde_json::{json, Value};

mod common;
use common::{body_json, echo_args};

fn binding_app() -> App {
    App::builder()
        .route(
            Route::get("/search")
                .param(ParamSpec::query("limit", TypeSchema::integer()))
                .param(ParamSpec::query("active", TypeSchema::boolean()).optional())
                .handler(echo_args()),
        )
        .route(
            Route::get("/echo_query")
                .param(ParamSpec::query("page", TypeSchema::integer()).default_value(1))
                .param(
                    ParamSpec::query("tag", TypeSchema::array(TypeSchema::string())).optional(),
                )
                .param(
                    ParamSpec::query("item_id", TypeSchema::string())
                        .with_alias("itemId")
                        .optional(),
                )
                .handler(echo_args()),
        )
        .route(
            Route::get("/headers")
                .param(ParamSpec::header("x_request_id", TypeSchema::string()))
                .param(
                    ParamSpec::header("x_literal", TypeSchema::string())
                        .raw_header_name()
                        .optional(),
                )
                .handler(echo_args()),
        )
        .route(
            Route::get("/whoami")
                .param(ParamSpec::cookie("session", TypeSchema::string()))
                .handler(echo_args()),
        )
        .route(
            Route::post("/pets")
                .param(ParamSpec::body(
                    "pet",
                    TypeSchema::object([
                        FieldSpec::required("name", TypeSchema::string()),
                        FieldSpec::with_default("age", TypeSchema::integer(), json!(0)),
                    ]),
                ))
                .handler(echo_args()),
        )
        .route(
            Route::post("/transfer")
                .param(ParamSpec::body("from", TypeSchema::string()))
                .param(ParamSpec::body("to", TypeSchema::string()))
                .handler(echo_args()),
        )
        .route(
            Route::post("/notes")
                .param(ParamSpec::body("note", TypeSchema::string()).embedded())
                .handler(echo_args()),
        )
        .route(
            Route::get("/users/{user_id:int}")
                .param(ParamSpec::path("user_id", TypeSchema::integer()))
                .param(ParamSpec::query("active", TypeSchema::boolean()).optional())
                .handler(echo_args()),
        )
        .route(
            Route::get("/range")
                .param(ParamSpec::query("n", TypeSchema::integer().ge(1).le(10)))
                .handler(echo_args()),
        )
        .build()
        .expect("app builds")
}

fn detail(reply: &Value) -> Vec<Value> {
    body_json(reply)["detail"]
        .as_array()
        .expect("detail array")
        .clone()
}

#[test]
fn test_missing_required_and_invalid_optional_make_two_issues() {
    let app = binding_app();
    let reply = app.handle(HttpEventBuilder::get("/search?active=maybe").build());
    assert_eq!(reply["statusCode"], 422);

    let issues = detail(&reply);
    assert_eq!(issues.len(), 2);
    assert!(issues
        .iter()
        .any(|i| i["loc"] == json!(["query", "limit"]) && i["type"] == "missing"));
    assert!(issues
        .iter()
        .any(|i| i["loc"] == json!(["query", "active"]) && i["type"] == "bool_parsing"));
}

#[test]
fn test_validation_entries_carry_loc_msg_type() {
    let app = binding_app();
    let reply = app.handle(HttpEventBuilder::get("/search").build());
    let issues = detail(&reply);
    assert_eq!(issues.len(), 1);
    let entry = issues[0].as_object().expect("issue object");
    assert!(entry.contains_key("loc"));
    assert!(entry.contains_key("msg"));
    assert!(entry.contains_key("type"));
    assert_eq!(entry["msg"], "Field required");
}

#[test]
fn test_defaults_and_optionals_bind_without_input() {
    let app = binding_app();
    let reply = app.handle(HttpEventBuilder::get("/echo_query").build());
    assert_eq!(reply["statusCode"], 200);
    let body = body_json(&reply);
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["tag"], Value::Null);
    assert_eq!(body["item_id"], Value::Null);
}

#[test]
fn test_alias_binds_the_wire_name() {
    let app = binding_app();
    let body = body_json(&app.handle(HttpEventBuilder::get("/echo_query?itemId=widget").build()));
    assert_eq!(body["item_id"], json!("widget"));
}

#[test]
fn test_array_param_collects_every_occurrence() {
    let app = binding_app();
    let body = body_json(&app.handle(
        HttpEventBuilder::get("/echo_query?tag=big%20dog&tag=small&page=2").build(),
    ));
    assert_eq!(body["tag"], json!(["big dog", "small"]));
    assert_eq!(body["page"], json!(2));
}

#[test]
fn test_header_underscores_map_to_hyphens() {
    let app = binding_app();
    let event = HttpEventBuilder::get("/headers")
        .header("X-Request-Id", "req-9")
        .build();
    let body = body_json(&app.handle(event));
    assert_eq!(body["x_request_id"], json!("req-9"));
}

#[test]
fn test_raw_header_name_keeps_underscores() {
    let app = binding_app();
    let event = HttpEventBuilder::get("/headers")
        .header("X-Request-Id", "req-9")
        .header("x_literal", "kept")
        .build();
    let body = body_json(&app.handle(event));
    assert_eq!(body["x_literal"], json!("kept"));
}

#[test]
fn test_cookie_param_binds_from_cookie_header() {
    let app = binding_app();
    let event = HttpEventBuilder::get("/whoami")
        .header("Cookie", "theme=dark; session=abc123")
        .build();
    let body = body_json(&app.handle(event));
    assert_eq!(body["session"], json!("abc123"));
}

#[test]
fn test_missing_cookie_reports_cookie_loc() {
    let app = binding_app();
    let reply = app.handle(HttpEventBuilder::get("/whoami").build());
    assert_eq!(reply["statusCode"], 422);
    let issues = detail(&reply);
    assert_eq!(issues[0]["loc"], json!(["cookie", "session"]));
    assert_eq!(issues[0]["type"], "missing");
}

#[test]
fn test_single_body_param_takes_whole_document() {
    let app = binding_app();
    let event = HttpEventBuilder::post("/pets")
        .json(&json!({"name": "rex"}))
        .build();
    let body = body_json(&app.handle(event));
    // Declared object fields apply their defaults during coercion.
    assert_eq!(body["pet"], json!({"name": "rex", "age": 0}));
}

#[test]
fn test_two_body_params_bind_their_keys() {
    let app = binding_app();
    let event = HttpEventBuilder::post("/transfer")
        .json(&json!({"from": "alice", "to": "bob"}))
        .build();
    let body = body_json(&app.handle(event));
    assert_eq!(body["from"], json!("alice"));
    assert_eq!(body["to"], json!("bob"));
}

#[test]
fn test_embedded_flag_forces_key_binding_for_single_param() {
    let app = binding_app();
    let event = HttpEventBuilder::post("/notes")
        .json(&json!({"note": "remember the milk"}))
        .build();
    let body = body_json(&app.handle(event));
    assert_eq!(body["note"], json!("remember the milk"));
}

#[test]
fn test_body_field_type_mismatch_is_string_type() {
    let app = binding_app();
    let event = HttpEventBuilder::post("/pets")
        .json(&json!({"name": 12}))
        .build();
    let reply = app.handle(event);
    assert_eq!(reply["statusCode"], 422);
    let issues = detail(&reply);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["type"], "string_type");
    assert_eq!(issues[0]["loc"], json!(["body", "name"]));
}

#[test]
fn test_unparseable_body_is_one_json_invalid_issue() {
    let app = binding_app();
    let event = HttpEventBuilder::post("/pets").text("{not json").build();
    let reply = app.handle(event);
    assert_eq!(reply["statusCode"], 422);
    let issues = detail(&reply);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["type"], "json_invalid");
    assert_eq!(issues[0]["loc"], json!(["body"]));
}

#[test]
fn test_converter_rejection_is_404_while_binding_failure_is_422() {
    let app = binding_app();

    let miss = app.handle(HttpEventBuilder::get("/users/abc").build());
    assert_eq!(miss["statusCode"], 404);
    assert_eq!(body_json(&miss), json!({"detail": "Not Found"}));

    let invalid = app.handle(HttpEventBuilder::get("/users/12?active=maybe").build());
    assert_eq!(invalid["statusCode"], 422);
    let issues = detail(&invalid);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["type"], "bool_parsing");
}

#[test]
fn test_numeric_bounds_report_their_kinds() {
    let app = binding_app();

    let low = app.handle(HttpEventBuilder::get("/range?n=0").build());
    assert_eq!(detail(&low)[0]["type"], "greater_than_equal");

    let high = app.handle(HttpEventBuilder::get("/range?n=11").build());
    assert_eq!(detail(&high)[0]["type"], "less_than_equal");

    let ok = app.handle(HttpEventBuilder::get("/range?n=10").build());
    assert_eq!(ok["statusCode"], 200);
}
