use crate::channel::Command;
use crate::runtime::ArcRuntime;
use crate::storage::KEY_TOR_STATUS;
use crate::tap::TapEvent;
use anyhow::Error;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;

/// Control surface for the UI and the interception collaborators, plus
/// prometheus exposition
pub async fn serve(runtime: ArcRuntime) {
    // bind address is validated during config load
    let addr = SocketAddr::from_str(&runtime.setting.bind).expect("validated bind address");

    let listener = match TcpListener::bind(addr).await {
        Ok(v) => v,
        Err(e) => {
            error!("api bind failed on {}: {:?}", addr, e);
            return;
        }
    };
    info!("api listening on {}", addr);

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!("api accept error: {:?}", e);
                continue;
            }
        };

        let runtime = runtime.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(runtime.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("api connection error: {:?}", e);
            }
        });
    }
}

async fn handle(
    runtime: ArcRuntime,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match route(runtime, &method, &path, req).await {
        Ok(v) => v,
        Err(e) => {
            debug!("bad request {} {}: {:?}", method, path, e);
            json_response(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
        }
    };

    Ok(response)
}

async fn route(
    runtime: ArcRuntime,
    method: &Method,
    path: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Error> {
    match (method, path) {
        (&Method::POST, "/proxy/start") => send_command(runtime, Command::StartTor).await,
        (&Method::POST, "/proxy/stop") => send_command(runtime, Command::StopTor).await,
        (&Method::POST, "/proxy/status") => send_command(runtime, Command::GetStatus).await,

        (&Method::GET, "/status") => {
            let status = runtime
                .store
                .get(KEY_TOR_STATUS)
                .await?
                .unwrap_or_else(|| "Initializing".to_string());
            Ok(json_response(StatusCode::OK, json!({ "status": status })))
        }

        (&Method::GET, _) if path.starts_with("/ledger/") => {
            let Some(id) = path_id(path, "/ledger/") else {
                return Ok(not_found());
            };
            let badge = runtime.ledger.badge(id);
            Ok(json_response(
                StatusCode::OK,
                json!({
                    "trackers": runtime.ledger.snapshot(id),
                    "score": runtime.ledger.score(id),
                    "badge": { "text": badge.text, "color": badge.color },
                }),
            ))
        }

        (&Method::POST, "/events") => {
            #[derive(Deserialize)]
            struct EventBody {
                context_id: i64,
                hostname: String,
            }

            let body = req.into_body().collect().await?.to_bytes();
            let event: EventBody = serde_json::from_slice(&body)?;
            runtime
                .tap_tx
                .send(TapEvent::Request {
                    context_id: event.context_id,
                    hostname: event.hostname,
                })
                .await?;
            Ok(json_response(StatusCode::ACCEPTED, json!({ "ok": true })))
        }

        (&Method::DELETE, _) if path.starts_with("/contexts/") => {
            let Some(id) = path_id(path, "/contexts/") else {
                return Ok(not_found());
            };
            runtime
                .tap_tx
                .send(TapEvent::ContextClosed {
                    context_id: id as i64,
                })
                .await?;
            Ok(json_response(StatusCode::ACCEPTED, json!({ "ok": true })))
        }

        (&Method::GET, "/metrics") => Ok(metrics_response()),

        _ => Ok(not_found()),
    }
}

/// Ensure the channel is up, then dispatch in the background; command
/// delivery is fire-and-forget, status comes back through the channel
async fn send_command(runtime: ArcRuntime, command: Command) -> Result<Response<Full<Bytes>>, Error> {
    if let Err(e) = runtime.channel.ensure_connected().await {
        warn!("host unavailable: {:?}", e);
        return Ok(json_response(
            StatusCode::BAD_GATEWAY,
            json!({ "error": "host unavailable" }),
        ));
    }

    let channel = runtime.channel.clone();
    tokio::spawn(async move {
        if let Err(e) = channel.send(command).await {
            warn!("send {:?} failed: {:?}", command, e);
        }
    });

    Ok(json_response(StatusCode::ACCEPTED, json!({ "ok": true })))
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("encode metrics failed: {:?}", e);
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::new(Bytes::from(buffer)))
        .unwrap()
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn path_id(path: &str, prefix: &str) -> Option<u32> {
    path.strip_prefix(prefix)?.parse().ok()
}
