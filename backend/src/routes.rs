use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::info;
use shared::ImageRequest;

use crate::gateway::{GatewayError, ImagePayload, InferenceGateway};

/// Base64 inflates the image by a third; leave room for the JSON envelope.
fn json_limit(max_payload_bytes: usize) -> usize {
    (max_payload_bytes / 3).saturating_mul(4).saturating_add(4096)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, max_payload_bytes: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(json_limit(max_payload_bytes))
            .error_handler(|err, _req| GatewayError::InvalidBody(err.to_string()).into()),
    )
    .service(web::resource("/").route(web::get().to(index)))
    .service(web::resource("/image-receiver").route(web::post().to(image_receiver)))
    .service(web::resource("/image-upload").route(web::post().to(image_upload)));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body("<p>Hello, World!</p>")
}

async fn image_receiver(
    gateway: web::Data<InferenceGateway>,
    body: web::Json<ImageRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = gateway.into_inner().handle(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn image_upload(
    gateway: web::Data<InferenceGateway>,
    mut payload: Multipart,
) -> Result<HttpResponse, GatewayError> {
    let mut upload: Option<ImagePayload> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))?
    {
        let mime_type = field.content_type().map(|m| m.essence_str().to_string());
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
            image_data.extend_from_slice(&data);
            gateway.scratch().validate_size(image_data.len())?;
        }
        if upload.is_none() && !image_data.is_empty() {
            info!("Received upload field '{}'", field.name().unwrap_or_default());
            upload = Some(ImagePayload {
                bytes: image_data,
                mime_type,
            });
        }
    }

    let upload = upload.ok_or(GatewayError::EmptyUpload)?;
    let response = gateway.into_inner().handle_upload(upload).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{jpeg_bytes, test_gateway};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};

    macro_rules! app {
        ($dir:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from(test_gateway($dir)))
                    .configure(|cfg| configure_routes(cfg, 1024 * 1024)),
            )
            .await
        };
    }

    #[core::prelude::v1::test]
    fn json_limit_covers_encoded_payload_and_saturates() {
        assert_eq!(json_limit(3 * 1024 * 1024), 4 * 1024 * 1024 + 4096);
        assert_eq!(json_limit(0), 4096);
        assert_eq!(json_limit(usize::MAX), usize::MAX);
        assert_eq!(json_limit(usize::MAX - 4096), usize::MAX);
    }

    fn assert_response_shape(body: &Value) {
        let outer = body.as_array().expect("top-level array");
        assert_eq!(outer.len(), 2);

        let food = outer[0].as_array().expect("food pair");
        assert_eq!(food.len(), 2);
        assert!(food[0].is_string());

        let categories = outer[1].as_array().expect("category list");
        assert!((1..=3).contains(&categories.len()));
        assert!(categories.iter().all(Value::is_string));
    }

    #[actix_web::test]
    async fn root_returns_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "<p>Hello, World!</p>");
    }

    #[actix_web::test]
    async fn plain_base64_returns_food_and_categories() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let req = test::TestRequest::post()
            .uri("/image-receiver")
            .set_json(json!({ "baseString": STANDARD.encode(jpeg_bytes()) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_response_shape(&body);
        assert_eq!(
            body,
            json!([["pizza", {"name": "pizza", "calories": 266}], ["Bread", "Dairy product"]])
        );
    }

    #[actix_web::test]
    async fn data_uri_prefix_gives_identical_result() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let encoded = STANDARD.encode(jpeg_bytes());

        let plain: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/image-receiver")
                .set_json(json!({ "baseString": encoded }))
                .to_request(),
        )
        .await;
        let prefixed: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/image-receiver")
                .set_json(json!({ "baseString": format!("data:image/jpeg;base64,{}", encoded) }))
                .to_request(),
        )
        .await;
        assert_response_shape(&prefixed);
        assert_eq!(plain, prefixed);
    }

    #[actix_web::test]
    async fn missing_base_string_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let req = test::TestRequest::post()
            .uri("/image-receiver")
            .set_json(json!({ "image": "abc" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("baseString"));
    }

    #[actix_web::test]
    async fn non_json_body_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let req = test::TestRequest::post()
            .uri("/image-receiver")
            .insert_header(("content-type", "text/plain"))
            .set_payload("baseString=abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn corrupt_image_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let req = test::TestRequest::post()
            .uri("/image-receiver")
            .set_json(json!({ "baseString": "@@@@" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    fn multipart_body(boundary: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"meal.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[actix_web::test]
    async fn multipart_upload_matches_base64_result() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let boundary = "platescan-boundary";
        let req = test::TestRequest::post()
            .uri("/image-upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, &jpeg_bytes()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_response_shape(&body);
        assert_eq!(body[0][0], "pizza");
    }

    #[actix_web::test]
    async fn multipart_without_data_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(dir.path());
        let boundary = "platescan-boundary";
        let req = test::TestRequest::post()
            .uri("/image-upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, b""))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
