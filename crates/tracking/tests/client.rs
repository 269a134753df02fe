use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ims_artifacts_model::{ArtifactLink, ImagePatch, JobPatch, NewImage, NewRecipe, TemplateDictionary};
use ims_artifacts_tracking::{HttpRetryPolicy, ImsClient, TrackingError, TrackingService, TrackingSettings};

fn client_for(server: &MockServer) -> ImsClient {
    let settings = TrackingSettings::new(format!("{}/apis/ims", server.uri())).with_retry(
        HttpRetryPolicy::default()
            .with_max_retries(3)
            .with_backoff(Duration::ZERO, Duration::ZERO),
    );
    ImsClient::new(settings).expect("client")
}

/// Fails with `status` until `failures` requests have been seen, then succeeds.
struct FlakyResponder {
    counter: Arc<AtomicUsize>,
    failures: usize,
    status: u16,
    body: serde_json::Value,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let seen = self.counter.fetch_add(1, Ordering::SeqCst);
        if seen < self.failures {
            ResponseTemplate::new(self.status)
        } else {
            ResponseTemplate::new(200).set_body_json(self.body.clone())
        }
    }
}

#[tokio::test]
async fn create_image_posts_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/ims/images"))
        .and(body_json(json!({ "name": "sles15-compute" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "4e78488d-4d92-4675-9d83-97adfc17cb19",
            "name": "sles15-compute",
            "created": "2024-01-01T00:00:00+00:00",
            "link": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .create_image(&NewImage {
            name: "sles15-compute".into(),
            arch: None,
        })
        .await
        .expect("create image");

    assert_eq!(record.id, "4e78488d-4d92-4675-9d83-97adfc17cb19");
    assert!(!record.is_published());
}

#[tokio::test]
async fn images_named_filters_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/ims/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a", "name": "sles15", "link": null },
            { "id": "b", "name": "cos", "link": null },
            { "id": "c", "name": "sles15", "link": {
                "path": "s3://boot-images/c/manifest.json", "etag": "e", "type": "s3"
            } }
        ])))
        .mount(&server)
        .await;

    let images = client_for(&server)
        .images_named("sles15")
        .await
        .expect("list images");

    let ids: Vec<&str> = images.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(images[1].is_published());
}

#[tokio::test]
async fn patch_image_link_and_job() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/apis/ims/images/abc"))
        .and(body_json(json!({
            "link": { "path": "s3://boot-images/abc/manifest.json", "etag": "e1", "type": "s3" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "name": "img",
            "link": { "path": "s3://boot-images/abc/manifest.json", "etag": "e1", "type": "s3" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/apis/ims/jobs/job-1"))
        .and(body_json(json!({ "resultant_image_id": "abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-1",
            "status": "packaging_artifacts",
            "resultant_image_id": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let image = client
        .patch_image(
            "abc",
            &ImagePatch::link(ArtifactLink::s3("boot-images", "abc/manifest.json", "e1")),
        )
        .await
        .expect("patch image");
    assert!(image.is_published());

    let job = client
        .patch_job("job-1", &JobPatch::resultant_image("abc"))
        .await
        .expect("patch job");
    assert_eq!(job.resultant_image_id.as_deref(), Some("abc"));
}

#[tokio::test]
async fn create_recipe_sends_template_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/ims/recipes"))
        .and(body_json(json!({
            "name": "compute",
            "recipe_type": "kiwi-ng",
            "linux_distribution": "sles15",
            "template_dictionary": [
                { "key": "CSM_RELEASE_VERSION", "value": "1.5.0" },
                { "key": "SLES_VERSION", "value": "15sp5" }
            ]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "r1",
            "name": "compute",
            "recipe_type": "kiwi-ng",
            "linux_distribution": "sles15",
            "template_dictionary": [
                { "key": "SLES_VERSION", "value": "15sp5" },
                { "key": "CSM_RELEASE_VERSION", "value": "1.5.0" }
            ],
            "link": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let template: TemplateDictionary = [
        ("SLES_VERSION", "15sp5"),
        ("CSM_RELEASE_VERSION", "1.5.0"),
    ]
    .into_iter()
    .collect();

    let recipe = client_for(&server)
        .create_recipe(&NewRecipe {
            name: "compute".into(),
            recipe_type: "kiwi-ng".into(),
            linux_distribution: "sles15".into(),
            template_dictionary: template.clone(),
            require_dkms: None,
            arch: None,
        })
        .await
        .expect("create recipe");

    assert_eq!(recipe.template_dictionary, template);
}

#[tokio::test]
async fn get_retries_gateway_errors() {
    let server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/apis/ims/images/abc"))
        .respond_with(FlakyResponder {
            counter: counter.clone(),
            failures: 2,
            status: 503,
            body: json!({ "id": "abc", "name": "img", "link": null }),
        })
        .mount(&server)
        .await;

    let image = client_for(&server)
        .get_image("abc")
        .await
        .expect("get after retries");

    assert_eq!(image.id, "abc");
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn get_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/apis/ims/recipes"))
        .respond_with(FlakyResponder {
            counter: counter.clone(),
            failures: usize::MAX,
            status: 502,
            body: json!([]),
        })
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_recipes()
        .await
        .expect_err("should give up");

    assert_eq!(err.status(), Some(502));
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn post_is_not_retried_on_gateway_error() {
    let server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path("/apis/ims/images"))
        .respond_with(FlakyResponder {
            counter: counter.clone(),
            failures: 1,
            status: 503,
            body: json!({ "id": "abc", "name": "img" }),
        })
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_image(&NewImage {
            name: "img".into(),
            arch: None,
        })
        .await
        .expect_err("POST must not be repeated");

    assert_eq!(err.status(), Some(503));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_errors_surface_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/apis/ims/images/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"title\": \"Not Found\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete_image("missing")
        .await
        .expect_err("404");

    assert!(err.is_not_found());
    match err {
        TrackingError::Status { body, .. } => assert!(body.contains("Not Found")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_response_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/ims/images"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_images()
        .await
        .expect_err("not JSON");

    assert!(matches!(err, TrackingError::Decode { .. }));
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/ims/images"))
        .and(header("authorization", "Bearer s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let settings = TrackingSettings::new(format!("{}/apis/ims", server.uri()))
        .with_bearer_token("s3cr3t")
        .with_retry(HttpRetryPolicy::none());
    let images = ImsClient::new(settings)
        .expect("client")
        .list_images()
        .await
        .expect("list");

    assert!(images.is_empty());
}
