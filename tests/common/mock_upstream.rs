use actix_web::dev::ServerHandle;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use bytes::Bytes;
use futures::stream;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stand-in for an OpenAI-compatible inference server.
pub struct MockUpstream {
    pub url: String,
    hits: Arc<AtomicUsize>,
    handle: ServerHandle,
}

async fn health(hits: web::Data<AtomicUsize>) -> HttpResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().body("ok")
}

async fn chat_completions(
    hits: web::Data<AtomicUsize>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    if body["stream"].as_bool().unwrap_or(false) {
        let chunks = ["Hello", " from", " upstream"].into_iter().map(|token| {
            let event = json!({"choices": [{"delta": {"content": token}}]});
            Ok::<_, std::io::Error>(Bytes::from(format!("data: {}\n\n", event)))
        });
        let done = std::iter::once(Ok(Bytes::from_static(b"data: [DONE]\n\n")));
        return HttpResponse::Ok()
            .content_type("text/event-stream")
            .streaming(stream::iter(chunks.chain(done)));
    }
    HttpResponse::Ok().json(json!({
        "object": "chat.completion",
        "choices": [{"message": {"role": "assistant", "content": "Hello from upstream"}}]
    }))
}

async fn overloaded(hits: web::Data<AtomicUsize>) -> HttpResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    HttpResponse::ServiceUnavailable()
        .insert_header(("retry-after", "5"))
        .json(json!({"error": {"message": "engine overloaded"}}))
}

/// Reflects the request back so tests can see what was forwarded.
async fn echo(req: HttpRequest, body: Bytes, hits: web::Data<AtomicUsize>) -> HttpResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    HttpResponse::Ok()
        .insert_header(("x-upstream", "mock"))
        .json(json!({
            "method": req.method().as_str(),
            "path": req.path(),
            "query": req.query_string(),
            "authorization": header("authorization"),
            "x_request_id": header("x-request-id"),
            "host": header("host"),
            "body": String::from_utf8_lossy(&body),
        }))
}

impl MockUpstream {
    pub async fn start() -> std::io::Result<Self> {
        let hits = web::Data::new(AtomicUsize::new(0));
        let counter = hits.clone().into_inner();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(hits.clone())
                .route("/health", web::get().to(health))
                .route("/healthz", web::get().to(health))
                .route("/v1/chat/completions", web::post().to(chat_completions))
                .route("/v1/overloaded", web::post().to(overloaded))
                .default_service(web::to(echo))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))?;

        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Ok(Self {
            url: format!("http://127.0.0.1:{}", port),
            hits: counter,
            handle,
        })
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}
