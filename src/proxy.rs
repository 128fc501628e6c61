use crate::config::GateConfig;
use actix_web::body::SizedStream;
use actix_web::http::{Method, StatusCode};
use actix_web::{HttpRequest, HttpResponse, error, web};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use log::error;
use std::pin::Pin;
use std::time::Duration;

const HOP_BY_HOP_HEADERS: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>>>>;

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name) || name.as_str() == "keep-alive"
}

/// Streaming reverse proxy to the OpenAI-compatible inference server.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamProxy {
    pub fn new(config: &GateConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::none());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.upstream_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url, path_and_query)
        } else {
            format!("{}/{}", self.base_url, path_and_query)
        }
    }

    /// Replay `req` against the upstream and stream its answer back.
    pub async fn forward(
        &self,
        req: &HttpRequest,
        body: Bytes,
    ) -> Result<HttpResponse, actix_web::Error> {
        let method = http::Method::from_bytes(req.method().as_str().as_bytes())
            .map_err(error::ErrorBadRequest)?;
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| req.path());
        let url = self.url_for(path_and_query);

        let resp = self
            .client
            .request(method, &url)
            .headers(upstream_request_headers(req))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to upstream {}: {}", url, e);
                error::ErrorBadGateway("Upstream inference server unavailable")
            })?;

        let status = StatusCode::from_u16(resp.status().as_u16())
            .map_err(|e| error::ErrorBadGateway(format!("Invalid status code: {}", e)))?;
        let mut builder = HttpResponse::build(status);
        for (name, value) in resp.headers() {
            if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                actix_web::http::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                continue;
            };
            builder.append_header((name, value));
        }

        // The length comes from the upstream header: for HEAD and bodyless
        // statuses the client reports an empty body, not the announced size.
        let content_length = announced_content_length(resp.headers());
        let bodyless = is_bodyless(req.method(), status);
        let stream: BodyStream = Box::pin(
            resp.bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        Ok(match content_length {
            Some(len) if bodyless => builder.no_chunking(len).streaming(stream),
            Some(len) => builder.body(SizedStream::new(len, stream)),
            None => builder.streaming(stream),
        })
    }
}

fn announced_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Responses that never carry a body, whatever their `Content-Length` says.
fn is_bodyless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Request headers to replay upstream: everything except hop-by-hop headers,
/// `Host` and `Content-Length`, which the client sets for the new connection.
fn upstream_request_headers(req: &HttpRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in req.headers().iter() {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        if is_hop_by_hop(&name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name, value);
    }
    headers
}

/// Default service: every request that got past the gate lands here.
pub async fn forward(
    req: HttpRequest,
    body: web::Bytes,
    proxy: web::Data<UpstreamProxy>,
) -> Result<HttpResponse, actix_web::Error> {
    proxy.forward(&req, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    fn proxy_for(url: &str) -> UpstreamProxy {
        let config = GateConfig {
            upstream_url: url.to_string(),
            ..Default::default()
        };
        UpstreamProxy::new(&config).unwrap()
    }

    #[::core::prelude::v1::test]
    fn test_url_for_joins_base_and_path() {
        let proxy = proxy_for("http://vllm:8000/");
        assert_eq!(proxy.base_url(), "http://vllm:8000");
        assert_eq!(
            proxy.url_for("/v1/chat/completions"),
            "http://vllm:8000/v1/chat/completions"
        );
        assert_eq!(
            proxy.url_for("v1/models?limit=2"),
            "http://vllm:8000/v1/models?limit=2"
        );
    }

    #[::core::prelude::v1::test]
    fn test_hop_by_hop_detection() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING));
        assert!(is_hop_by_hop(&HeaderName::from_static("keep-alive")));
        assert!(!is_hop_by_hop(&header::AUTHORIZATION));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
    }

    #[::core::prelude::v1::test]
    fn test_upstream_request_headers_filtering() {
        let req = test::TestRequest::post()
            .uri("/v1/completions")
            .insert_header(("Authorization", "Bearer abc123"))
            .insert_header(("Content-Type", "application/json"))
            .insert_header(("Host", "gate.example.com"))
            .insert_header(("Connection", "keep-alive"))
            .insert_header(("Keep-Alive", "timeout=5"))
            .insert_header(("Content-Length", "42"))
            .insert_header(("X-Request-Id", "req-1"))
            .to_http_request();

        let headers = upstream_request_headers(&req);
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc123");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[::core::prelude::v1::test]
    fn test_announced_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(announced_content_length(&headers), None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("124"));
        assert_eq!(announced_content_length(&headers), Some(124));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(announced_content_length(&headers), None);
    }

    #[::core::prelude::v1::test]
    fn test_bodyless_responses() {
        assert!(is_bodyless(&Method::HEAD, StatusCode::OK));
        assert!(is_bodyless(&Method::GET, StatusCode::NO_CONTENT));
        assert!(is_bodyless(&Method::GET, StatusCode::NOT_MODIFIED));
        assert!(is_bodyless(&Method::GET, StatusCode::CONTINUE));
        assert!(!is_bodyless(&Method::GET, StatusCode::OK));
        assert!(!is_bodyless(&Method::POST, StatusCode::SERVICE_UNAVAILABLE));
    }

    #[::core::prelude::v1::test]
    fn test_request_timeout_is_optional() {
        let config = GateConfig {
            request_timeout_secs: Some(30),
            ..Default::default()
        };
        assert!(UpstreamProxy::new(&config).is_ok());
    }
}
