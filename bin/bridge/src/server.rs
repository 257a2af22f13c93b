//! HTTPS listener and request routing
//!
//! Everything here is transport glue: TLS accept, JSON framing, the CORS
//! origin gate and path dispatch. Protocol semantics live in
//! `scbridge-core`; this layer only translates between HTTP and the
//! [`Bridge`](crate::state::Bridge) operations.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::api;
use crate::state::Bridge;

/// Everything a connection task needs, shared by Arc
pub(crate) struct ServerContext {
    pub(crate) bridge: Bridge,
    /// The only Origin allowed to talk to the bridge
    pub(crate) origin: String,
    /// Port reported by the version endpoint
    pub(crate) port: u16,
}

type HttpResponse = Response<Full<Bytes>>;

/// Accept loop: TLS handshake per connection, one task per connection
///
/// Returns when `shutdown` resolves (ctrl-c or the socket-activation
/// window expiring).
pub(crate) async fn serve(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    context: Arc<ServerContext>,
    shutdown: impl std::future::Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let context = Arc::clone(&context);
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = service_fn(move |req| {
                let context = Arc::clone(&context);
                async move { Ok::<_, Infallible>(handle(context, req).await) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
            {
                debug!(%peer, error = %e, "connection error");
            }
        });
    }

    info!("listener stopped, closing sessions");
    context.bridge.close_all();
}

/// Route one request
async fn handle(context: Arc<ServerContext>, req: Request<Incoming>) -> HttpResponse {
    // Gate everything, preflight included, on the portal origin. Keeps
    // arbitrary local pages and forms from driving the card.
    if !origin_allowed(&req, &context.origin) {
        return with_cors(empty_status(StatusCode::FORBIDDEN), &context.origin);
    }

    if req.method() == Method::OPTIONS {
        return with_cors(preflight(), &context.origin);
    }

    let path = req.uri().path().to_owned();
    let response = if req.method() != Method::POST {
        empty_status(StatusCode::NOT_FOUND)
    } else if path == "/scard/version/" {
        handle_version(&context)
    } else if path == "/scard/list/" {
        handle_list(&context).await
    } else if path == "/scard/getref/" {
        handle_getref(&context)
    } else if let Some(reader) = path.strip_prefix("/scard/apdu/") {
        let reader = percent_decode_str(reader).decode_utf8_lossy().into_owned();
        handle_apdu(&context, &reader, req).await
    } else if path == "/scard/disconnect/" {
        handle_disconnect(&context, req).await
    } else {
        empty_status(StatusCode::NOT_FOUND)
    };

    with_cors(response, &context.origin)
}

fn handle_version(context: &ServerContext) -> HttpResponse {
    json_response(
        StatusCode::OK,
        &api::VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            port: context.port,
        },
    )
}

async fn handle_list(context: &ServerContext) -> HttpResponse {
    match context.bridge.list_readers().await {
        Ok(readers) => json_response(
            StatusCode::OK,
            &api::ListResponse {
                readers: readers
                    .into_iter()
                    .map(|r| api::ReaderEntry {
                        cardstatus: if r.has_card {
                            api::CARD_PRESENT
                        } else {
                            api::NO_CARD
                        },
                        name: r.name,
                    })
                    .collect(),
                errorcode: 0,
                errordetail: 0,
            },
        ),
        Err(e) => error_response(&e),
    }
}

fn handle_getref(context: &ServerContext) -> HttpResponse {
    let reference = context.bridge.create_reference();
    json_response(
        StatusCode::OK,
        &api::RefResponse {
            id: reference.id,
            data: hex::encode_upper(reference.key),
        },
    )
}

async fn handle_apdu(
    context: &ServerContext,
    reader_name: &str,
    req: Request<Incoming>,
) -> HttpResponse {
    let body: api::ApduRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let mut commands = Vec::with_capacity(body.apducommands.len());
    for entry in &body.apducommands {
        match hex::decode(&entry.apdu) {
            Ok(bytes) => commands.push(bytes),
            Err(_) => return bad_request("invalid hex in apdu command"),
        }
    }

    match context
        .bridge
        .send_apdus(reader_name, &body.session, commands)
        .await
    {
        Ok(responses) => json_response(
            StatusCode::OK,
            &api::ApduResponses {
                apduresponses: responses
                    .into_iter()
                    .map(|bytes| api::ApduEntry {
                        apdu: hex::encode_upper(bytes),
                    })
                    .collect(),
                errorcode: 0,
                errordetail: 0,
            },
        ),
        Err(e) => error_response(&e),
    }
}

async fn handle_disconnect(context: &ServerContext, req: Request<Incoming>) -> HttpResponse {
    let body: api::DisconnectRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match context.bridge.disconnect(&body.session).await {
        Ok(()) => empty_status(StatusCode::OK),
        Err(e) => error_response(&e),
    }
}

/// The portal must announce itself: CORS fetch mode and the exact origin
fn origin_allowed<T>(req: &Request<T>, origin: &str) -> bool {
    let header_is = |name: &str, expected: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    };
    header_is("sec-fetch-mode", "cors") && header_is("origin", origin)
}

fn preflight() -> HttpResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "POST")
        .header("Access-Control-Allow-Private-Network", "true")
        .body(Full::new(Bytes::new()))
        .unwrap_or_default()
}

fn with_cors(mut response: HttpResponse, origin: &str) -> HttpResponse {
    if let Ok(value) = origin.parse() {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response
}

fn empty_status(status: StatusCode) -> HttpResponse {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap_or_default()
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(encoded) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(encoded)))
            .unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "response encoding failed");
            empty_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_response(err: &scbridge_core::Error) -> HttpResponse {
    let (status, errorcode) = api::error_mapping(err);
    warn!(%err, errorcode, "request failed");
    json_response(
        status,
        &api::ErrorResponse {
            errorcode,
            errordetail: err.to_string(),
        },
    )
}

fn bad_request(detail: &str) -> HttpResponse {
    json_response(
        StatusCode::BAD_REQUEST,
        &api::ErrorResponse {
            errorcode: 1,
            errordetail: detail.to_owned(),
        },
    )
}

/// Collect and decode a JSON request body, or produce the failure response
async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, HttpResponse> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Err(bad_request("unreadable request body")),
    };
    serde_json::from_slice(&bytes).map_err(|_| bad_request("invalid JSON body"))
}
