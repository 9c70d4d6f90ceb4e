/// Tower Layer integration for the authorization interceptor
///
/// Installed once on the server (`Server::builder().layer(..)`), it wraps
/// every unary and server-streaming call. The request body is wrapped in a
/// [`ReplayBody`] so the message inspected here is the one the handler reads.
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};

use crate::config::AuthzConfig;
use crate::interceptor::Authorizer;
use crate::replay::ReplayBody;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Authorization Layer for Tower services
#[derive(Clone)]
pub struct AuthzLayer {
    authorizer: Authorizer,
    max_message_bytes: usize,
}

impl AuthzLayer {
    pub fn new(authorizer: Authorizer, max_message_bytes: usize) -> Self {
        Self {
            authorizer,
            max_message_bytes,
        }
    }

    pub fn from_config(authorizer: Authorizer, config: &AuthzConfig) -> Self {
        Self::new(
            authorizer.with_resolve_timeout(config.resolve_timeout()),
            config.max_message_bytes,
        )
    }
}

impl<S> Layer<S> for AuthzLayer {
    type Service = AuthzService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AuthzService {
            inner: service,
            authorizer: self.authorizer.clone(),
            max_message_bytes: self.max_message_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AuthzService<S> {
    inner: S,
    authorizer: Authorizer,
    max_message_bytes: usize,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for AuthzService<S>
where
    S: Service<http::Request<BoxBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: http_body::Body<Data = Bytes> + Unpin + Send + 'static,
    ReqBody::Error: Into<BoxError> + std::fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // Take the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authorizer = self.authorizer.clone();
        let max_message_bytes = self.max_message_bytes;

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let mut body = ReplayBody::new(body, max_message_bytes);
            let call_timeout = grpc_timeout(&parts.headers);

            let decision = authorizer
                .authorize_call(parts.uri.path(), &parts.headers, &mut body, call_timeout)
                .await;

            match decision {
                Ok(claims) => {
                    if let Some(claims) = claims {
                        parts.extensions.insert(claims);
                    }
                    let req = http::Request::from_parts(parts, tonic::body::boxed(body));
                    inner.call(req).await
                }
                Err(e) => Ok(Status::from(e).into_http()),
            }
        })
    }
}

/// Client deadline from the `grpc-timeout` header
///
/// Format is up to 8 ASCII digits followed by a unit: `H`, `M`, `S`, `m`
/// (millis), `u` (micros) or `n` (nanos). Malformed values are ignored.
pub fn grpc_timeout(headers: &http::HeaderMap) -> Option<Duration> {
    let value = headers.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    if value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };

    Some(duration)
}
