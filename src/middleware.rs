use crate::config::DEFAULT_BYPASS_PATHS;
use crate::credentials::{AuthDecision, CredentialStore};
use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::AUTHORIZATION,
};
use futures_util::future::LocalBoxFuture;
use std::collections::HashSet;
use std::future::{Ready, ready};
use std::sync::Arc;

/// Which way a forwarded request got past the gate. Stored in the request
/// extensions before the downstream service is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Bypassed,
    Authenticated,
}

/// Paths that skip authentication. Matched exactly against the request
/// path; the query string plays no part.
#[derive(Debug, Clone)]
pub struct BypassSet {
    paths: HashSet<String>,
}

impl BypassSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

impl Default for BypassSet {
    fn default() -> Self {
        Self::new(DEFAULT_BYPASS_PATHS)
    }
}

/// Bearer-token gate in front of the wrapped service.
///
/// Requests on a bypass path go straight through. Everything else needs an
/// `Authorization: Bearer <token>` header whose token is in the
/// [`CredentialStore`]; otherwise the request is answered with a 401 and the
/// wrapped service is never called. Responses from the wrapped service are
/// returned untouched, streaming bodies included.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<CredentialStore>,
    bypass: Arc<BypassSet>,
}

impl AuthGate {
    pub fn new(store: Arc<CredentialStore>, bypass: BypassSet) -> Self {
        Self {
            store,
            bypass: Arc::new(bypass),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateService {
            service,
            store: self.store.clone(),
            bypass: self.bypass.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: S,
    store: Arc<CredentialStore>,
    bypass: Arc<BypassSet>,
}

impl<S, B> AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    fn forward(
        &self,
        req: ServiceRequest,
        outcome: GateOutcome,
    ) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>> {
        req.extensions_mut().insert(outcome);
        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.bypass.contains(req.path()) {
            return self.forward(req, GateOutcome::Bypassed);
        }

        let decision = {
            let auth_header = req
                .headers()
                .get(AUTHORIZATION)
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .unwrap_or_default();
            self.store.validate(&auth_header)
        };

        match decision {
            AuthDecision::Allowed => self.forward(req, GateOutcome::Authenticated),
            AuthDecision::Rejected(failure) => {
                let response = req.error_response(failure).map_into_right_body();
                Box::pin(ready(Ok(response)))
            }
        }
    }
}
