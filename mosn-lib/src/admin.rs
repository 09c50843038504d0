// Copyright 2025 The kmesh Authors
//
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    header::{HeaderValue, ALLOW, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use mosn_error::Context;
use serde::Serialize;
use std::{borrow::Cow, convert::Infallible, sync::Arc};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{debug, error, info, warn, Instrument};

use crate::Result;

type Body = Full<Bytes>;

pub const CONFIG_DUMP_PATH: &str = "/api/v1/config_dump";
/// `{ error: "internal error" }` written as JSON, with the key quoted.
const INTERNAL_ERROR_BODY: &[u8] = br#"{"error":"internal error"}"#;

/// Expands the `:PORT` shorthand to all IPv4 interfaces.
pub fn normalize_address(address: &str) -> Cow<'_, str> {
    if address.starts_with(':') {
        Cow::Owned(format!("0.0.0.0{address}"))
    } else {
        Cow::Borrowed(address)
    }
}

pub async fn bind(address: &str) -> Result<TcpListener> {
    let address = normalize_address(address);
    TcpListener::bind(address.as_ref()).await.with_context(|| format!("failed to bind admin server to {address}"))
}

/// Starts the admin server in the background.
///
/// Failures are logged and never reach the caller.
pub fn spawn_admin_server<C>(address: &str, config: Arc<C>) -> JoinHandle<()>
where
    C: Serialize + Send + Sync + 'static,
{
    let address = address.to_owned();
    tokio::spawn(async move {
        let listener = match bind(&address).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("Admin server failed to start: {err}");
                return;
            },
        };
        if let Err(err) = serve(listener, config).await {
            error!("Admin server stopped: {err}");
        }
    }
    .in_current_span())
}

pub async fn serve<C>(listener: TcpListener, config: Arc<C>) -> Result<()>
where
    C: Serialize + Send + Sync + 'static,
{
    let local_addr = listener.local_addr()?;
    info!("Admin server serve on {local_addr}");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("Admin server failed to accept a connection: {err}");
                continue;
            },
        };
        debug!("Admin connection from {peer}");
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let svc = service_fn(move |req: Request<hyper::body::Incoming>| {
                let config = Arc::clone(&config);
                async move { Ok::<_, Infallible>(handle_request(req.method(), req.uri().path(), config.as_ref())) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), svc).await {
                warn!("Admin server failed to respond to {peer}: {err}");
            }
        }
        .in_current_span());
    }
}

fn handle_request<C: Serialize>(method: &Method, path: &str, config: &C) -> Response<Body> {
    match (method, path) {
        (&Method::GET, CONFIG_DUMP_PATH) => config_dump(config),
        (_, CONFIG_DUMP_PATH) => {
            let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED);
            response.headers_mut().insert(ALLOW, HeaderValue::from_static("GET"));
            response
        },
        _ => status_response(StatusCode::NOT_FOUND),
    }
}

fn config_dump<C: Serialize>(config: &C) -> Response<Body> {
    match serde_json::to_vec(config) {
        Ok(body) => json_response(StatusCode::OK, Bytes::from(body)),
        Err(err) => {
            error!("Admin API: ConfigDump failed, cause by {err}");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::from_static(INTERNAL_ERROR_BODY))
        },
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigStore;
    use http_body_util::BodyExt;
    use mosn_error::Error;
    use serde::Serializer;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tracing_test::traced_test;

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("broken config"))
        }
    }

    async fn body_of(response: Response<Body>) -> Bytes {
        match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        }
    }

    #[test]
    fn shorthand_addresses() {
        assert_eq!(normalize_address(":8888"), "0.0.0.0:8888");
        assert_eq!(normalize_address("127.0.0.1:34901"), "127.0.0.1:34901");
    }

    #[tokio::test]
    async fn routes() {
        let store = ConfigStore::default();
        let response = handle_request(&Method::GET, CONFIG_DUMP_PATH, &store);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_of(response).await, r#"{"listeners":[],"clusters":[],"routers":[]}"#);

        let response = handle_request(&Method::POST, CONFIG_DUMP_PATH, &store);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(handle_request(&Method::GET, "/api/v1/stats", &store).status(), StatusCode::NOT_FOUND);
    }

    #[traced_test]
    #[tokio::test]
    async fn dump_failure_is_internal_error() {
        let response = handle_request(&Method::GET, CONFIG_DUMP_PATH, &Broken);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body, r#"{"error":"internal error"}"#);
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, serde_json::json!({"error": "internal error"}));
        assert!(logs_contain("Admin API: ConfigDump failed, cause by broken config"));
    }

    #[traced_test]
    #[tokio::test]
    async fn serves_over_tcp() -> std::result::Result<(), Error> {
        let listener = bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let store = Arc::new(ConfigStore::default());
        store.merge("original_config", serde_json::json!({"admin": {"address": ":8888"}}));
        let server = tokio::spawn(serve(listener, store).in_current_span());

        let mut stream = tokio::net::TcpStream::connect(address).await?;
        stream
            .write_all(b"GET /api/v1/config_dump HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        server.abort();

        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with(r#""original_config":{"admin":{"address":":8888"}}}"#), "{response}");
        assert!(logs_contain("Admin server serve on 127.0.0.1:"));
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn bind_failure_does_not_propagate() -> std::result::Result<(), Error> {
        let taken = bind("127.0.0.1:0").await?;
        let address = taken.local_addr()?.to_string();
        let handle = spawn_admin_server(&address, Arc::new(ConfigStore::default()));
        handle.await?;
        assert!(logs_contain("Admin server failed to start: failed to bind admin server to"));
        Ok(())
    }
}
