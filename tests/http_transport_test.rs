//! HTTP Transport Tests
//!
//! Exercises `HttpTransport` against a wiremock endpoint.
//!
//! ## Test Coverage
//!
//! - Method, path and headers reach the endpoint unchanged
//! - Multipart body carries the `file` part and every extra field
//! - Non-2xx statuses are returned, not turned into errors
//! - Body progress is reported up to the chunk length
//! - Connection failures map to `TransportError::RequestError`

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chunkr::transport::{
        ChunkRequest, HttpTransport, ProgressReporter, Transport, TransportError,
    };
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: String, body: &'static [u8]) -> ChunkRequest {
        let mut fields = BTreeMap::new();
        fields.insert("upload_preset".to_string(), "video_async".to_string());

        ChunkRequest {
            method: "POST".to_string(),
            url,
            headers: vec![
                ("Content-Range".to_string(), "bytes 0-4/-1".to_string()),
                ("X-Unique-Upload-Id".to_string(), "session-1".to_string()),
            ],
            body: Bytes::from_static(body),
            file_name: "movie.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            fields: Arc::new(fields),
        }
    }

    // ========================================================================
    // TEST: Request Shape
    // ========================================================================

    #[tokio::test]
    async fn test_send_forwards_method_path_and_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("Content-Range", "bytes 0-4/-1"))
            .and(header("X-Unique-Upload-Id", "session-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"done\":false}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let response = transport
            .send(
                request(format!("{}/upload", mock_server.uri()), b"hello"),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(&response.body[..], b"{\"done\":false}");
    }

    #[tokio::test]
    async fn test_send_builds_multipart_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        transport
            .send(
                request(mock_server.uri(), b"chunk-bytes"),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();

        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);

        let content_type = received[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"movie.mp4\""));
        assert!(body.to_ascii_lowercase().contains("content-type: video/mp4"));
        assert!(body.contains("chunk-bytes"));
        assert!(body.contains("name=\"upload_preset\""));
        assert!(body.contains("video_async"));
    }

    #[tokio::test]
    async fn test_send_uses_configured_method() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut req = request(mock_server.uri(), b"abc");
        req.method = "put".to_string();

        let transport = HttpTransport::new(None).unwrap();
        let response = transport.send(req, ProgressReporter::noop()).await.unwrap();
        assert_eq!(response.status, 201);
    }

    // ========================================================================
    // TEST: Status Handling
    // ========================================================================

    #[tokio::test]
    async fn test_error_status_is_returned_as_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let response = transport
            .send(request(mock_server.uri(), b"abc"), ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(&response.body[..], b"busy");
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        // Bind and drop to find a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = HttpTransport::new(Some(std::time::Duration::from_secs(5))).unwrap();
        let result = transport
            .send(
                request(format!("http://127.0.0.1:{}/upload", port), b"abc"),
                ProgressReporter::noop(),
            )
            .await;

        assert!(matches!(result, Err(TransportError::RequestError(_))));
    }

    #[tokio::test]
    async fn test_invalid_method_is_config_error() {
        let transport = HttpTransport::new(None).unwrap();
        let mut req = request("http://127.0.0.1:1/upload".to_string(), b"abc");
        req.method = "BAD METHOD".to_string();

        let result = transport.send(req, ProgressReporter::noop()).await;
        assert!(matches!(result, Err(TransportError::ConfigError(_))));
    }

    // ========================================================================
    // TEST: Progress Reporting
    // ========================================================================

    #[tokio::test]
    async fn test_progress_reaches_chunk_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        static BODY: [u8; 200 * 1024] = [7u8; 200 * 1024];

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(move |p| sink.lock().push(p));

        let transport = HttpTransport::new(None).unwrap();
        transport
            .send(request(mock_server.uri(), &BODY), reporter)
            .await
            .unwrap();

        let seen = seen.lock();
        assert!(seen.len() >= 2, "expected several progress updates");
        assert!(seen.windows(2).all(|w| w[0].loaded <= w[1].loaded));

        let last = seen.last().unwrap();
        assert_eq!(last.loaded, BODY.len() as u64);
        assert_eq!(last.total, BODY.len() as u64);
        assert!(last.length_computable);
    }
}
