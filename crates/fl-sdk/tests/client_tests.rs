//! Exercises every client operation against a mocked platform.

use fl_sdk::*;
use mockito::{Matcher, Server};
use serde_json::json;

fn creation() -> FunctionCreation {
    FunctionCreation {
        name: "hellojs".to_string(),
        namespace: "helloNS".to_string(),
        code: "function main(args) {}".to_string(),
        image: "nodejs".to_string(),
    }
}

#[tokio::test]
async fn test_create_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/create")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "name": "hellojs",
            "namespace": "helloNS",
            "code": "function main(args) {}",
            "image": "nodejs"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":"hellojs"}"#)
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let result = client.create(&creation()).await.unwrap();

    assert_eq!(result.result, "hellojs");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invoke_with_args() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/invoke")
        .match_body(Matcher::Json(json!({
            "function": "hellojs",
            "namespace": "helloNS",
            "args": {"name": "Test"}
        })))
        .with_status(200)
        .with_body(r#"{"result":{"payload":"Hello Test!"}}"#)
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let result = client
        .invoke(&FunctionInvocation {
            function: "hellojs".to_string(),
            namespace: "helloNS".to_string(),
            args: Some(json!({"name": "Test"})),
        })
        .await
        .unwrap();

    assert_eq!(result.result, Some(json!({"payload": "Hello Test!"})));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invoke_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/invoke")
        .with_status(404)
        .with_body(
            r#"{"error":"Failed to invoke function: function not found in given namespace"}"#,
        )
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let err = client
        .invoke(&FunctionInvocation {
            function: "hellojs".to_string(),
            namespace: "helloNS_".to_string(),
            args: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(PlatformErrorKind::NotFound));
    assert!(matches!(
        err.model(),
        Some(ErrorModel::FunctionInvocationError(_))
    ));
    assert_eq!(
        extract_error(&err),
        "Failed to invoke function: function not found in given namespace"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_and_error_model_per_operation() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/delete")
        .match_body(Matcher::Json(json!({"name": "hellojs", "namespace": "helloNS"})))
        .with_status(200)
        .with_body(r#"{"result":"hellojs"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let deletion = FunctionDeletion {
        name: "hellojs".to_string(),
        namespace: "helloNS".to_string(),
    };
    assert_eq!(client.delete(&deletion).await.unwrap().result, "hellojs");
    ok.assert_async().await;
    ok.remove_async().await;

    let missing = server
        .mock("POST", "/delete")
        .with_status(404)
        .with_body(r#"{"error":"Failed to delete function: not found"}"#)
        .create_async()
        .await;
    let err = client.delete(&deletion).await.unwrap_err();
    assert_eq!(
        err.model(),
        Some(&ErrorModel::FunctionDeletionError(FunctionError {
            error: "Failed to delete function: not found".to_string()
        }))
    );
    missing.assert_async().await;
}

#[tokio::test]
async fn test_error_without_model() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/create")
        .with_status(415)
        .with_body("Unsupported Media Type")
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let err = client.create(&creation()).await.unwrap_err();

    assert_eq!(err.kind(), Some(PlatformErrorKind::UnsupportedMediaType));
    assert!(err.model().is_none());
    assert_eq!(extract_error(&err), "415 Unsupported Media Type");
}

#[tokio::test]
async fn test_malformed_success_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/create")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = FlClient::new(server.url());
    let err = client.create(&creation()).await.unwrap_err();
    assert!(matches!(err, SdkError::Serialization(_)));
    assert_eq!(err.kind(), None);
}
