//! Exception table tests: most-specific-handler lookup, built-in fallbacks,
//! debug-mode rendering, and panic isolation.

use portico::{
    exception_fn, handler_fn, App, ErrorKind, HandlerError, HttpEventBuilder, Outcome, Response,
    Route, RuntimeConfig,
};
use serde_json::json;

mod common;
use common::{body_json, fixed};

fn failing_route(err: fn() -> HandlerError) -> Route {
    Route::get("/pets").handler(handler_fn(move |_req, _args| Err(err())))
}

#[test]
fn test_code_handler_beats_kind_handler() {
    let app = App::builder()
        .exception_code(
            "OutOfStock",
            exception_fn(|_req, _err| {
                Response::json(409, json!({"detail": "Item is out of stock"}))
            }),
        )
        .exception_kind(
            ErrorKind::Handler,
            exception_fn(|_req, _err| Response::json(500, json!({"detail": "kind handler"}))),
        )
        .route(failing_route(|| {
            HandlerError::custom("OutOfStock", "sku 1412")
        }))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 409);
    assert_eq!(body_json(&reply), json!({"detail": "Item is out of stock"}));
}

#[test]
fn test_kind_handler_catches_codes_without_their_own() {
    let app = App::builder()
        .exception_kind(
            ErrorKind::Handler,
            exception_fn(|_req, _err| Response::json(400, json!({"detail": "kind handler"}))),
        )
        .route(failing_route(|| HandlerError::custom("Unmapped", "x")))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 400);
    assert_eq!(body_json(&reply), json!({"detail": "kind handler"}));
}

#[test]
fn test_status_handler_catches_matching_http_errors_only() {
    let app = App::builder()
        .exception_status(
            418,
            exception_fn(|_req, _err| {
                Response::json(418, json!({"detail": "Teapot, but politely"}))
            }),
        )
        .route(failing_route(|| HandlerError::http(418, "I'm a teapot")))
        .route(Route::get("/gone").handler(handler_fn(|_req, _args| {
            Err(HandlerError::http(410, "Gone"))
        })))
        .build()
        .expect("app builds");

    let remapped = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(remapped["statusCode"], 418);
    assert_eq!(body_json(&remapped), json!({"detail": "Teapot, but politely"}));

    // A different status renders through the built-in path untouched.
    let untouched = app.handle(HttpEventBuilder::get("/gone").build());
    assert_eq!(untouched["statusCode"], 410);
    assert_eq!(body_json(&untouched), json!({"detail": "Gone"}));
}

#[test]
fn test_validation_kind_handler_remaps_422() {
    let app = App::builder()
        .exception_kind(
            ErrorKind::Validation,
            exception_fn(|_req, _err| Response::json(400, json!({"detail": "Bad input"}))),
        )
        .route(
            Route::get("/pets/{pet_id:int}").handler(fixed(json!("pet"))),
        )
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets/42").query_pair("page", "x").build());
    assert_eq!(reply["statusCode"], 200, "no declared params, no validation");

    let app = App::builder()
        .exception_kind(
            ErrorKind::Validation,
            exception_fn(|_req, _err| Response::json(400, json!({"detail": "Bad input"}))),
        )
        .route(
            Route::post("/pets")
                .request_schema(json!({
                    "type": "object",
                    "required": ["name"],
                }))
                .handler(fixed(json!("created"))),
        )
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::post("/pets").json(&json!({})).build());
    assert_eq!(reply["statusCode"], 400);
    assert_eq!(body_json(&reply), json!({"detail": "Bad input"}));
}

#[test]
fn test_unregistered_custom_code_renders_generic_500() {
    let app = App::builder()
        .route(failing_route(|| HandlerError::custom("OutOfStock", "sku 1412")))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 500);
    assert_eq!(body_json(&reply), json!({"detail": "Internal Server Error"}));
}

#[test]
fn test_handler_panic_renders_generic_500() {
    let app = App::builder()
        .route(Route::get("/pets").handler(handler_fn(|_req, _args| {
            panic!("boom");
        })))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 500);
    assert_eq!(body_json(&reply), json!({"detail": "Internal Server Error"}));
}

#[test]
fn test_debug_mode_exposes_panic_text() {
    let app = App::builder()
        .config(RuntimeConfig {
            debug: true,
            ..RuntimeConfig::default()
        })
        .route(Route::get("/pets").handler(handler_fn(|_req, _args| {
            panic!("boom");
        })))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 500);
    let detail = body_json(&reply)["detail"]
        .as_str()
        .expect("detail string")
        .to_string();
    assert!(detail.contains("boom"), "got: {detail}");
}

#[test]
fn test_not_found_bypasses_the_exception_table() {
    let app = App::builder()
        .exception_kind(
            ErrorKind::RouteNotFound,
            exception_fn(|_req, _err| Response::json(200, json!({"detail": "swallowed"}))),
        )
        .route(Route::get("/pets").handler(fixed(json!([]))))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/missing").build());
    assert_eq!(reply["statusCode"], 404);
    assert_eq!(body_json(&reply), json!({"detail": "Not Found"}));
}

#[test]
fn test_panicking_exception_handler_falls_back_to_builtin() {
    let app = App::builder()
        .exception_code(
            "OutOfStock",
            exception_fn(|_req, _err| panic!("handler bug")),
        )
        .route(failing_route(|| HandlerError::custom("OutOfStock", "sku 1412")))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 500);
    assert_eq!(body_json(&reply), json!({"detail": "Internal Server Error"}));
}

#[test]
fn test_http_error_headers_reach_the_envelope() {
    let app = App::builder()
        .route(Route::get("/pets").handler(handler_fn(|_req, _args| {
            Err(HandlerError::http_with_headers(
                301,
                "Moved",
                vec![("location".to_string(), "/animals".to_string())],
            ))
        })))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 301);
    assert_eq!(reply["headers"]["location"], "/animals");
}

#[test]
fn test_exception_handler_sees_the_original_error() {
    let app = App::builder()
        .exception_code(
            "OutOfStock",
            exception_fn(|_req, err| match err {
                portico::ApiError::Handler(HandlerError::Custom { detail, .. }) => {
                    Response::json(409, json!({"detail": detail}))
                }
                _ => Response::json(500, json!({"detail": "unexpected"})),
            }),
        )
        .route(failing_route(|| HandlerError::custom("OutOfStock", "sku 1412")))
        .build()
        .expect("app builds");

    let reply = app.handle(HttpEventBuilder::get("/pets").build());
    assert_eq!(reply["statusCode"], 409);
    assert_eq!(body_json(&reply), json!({"detail": "sku 1412"}));
}
