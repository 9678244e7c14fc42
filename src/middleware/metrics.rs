//! Per-endpoint request metrics.
//!
//! Every finished request is recorded in `AppState` under
//! `"<METHOD> <route pattern>"`, so `/api/v1/metrics` can report counts,
//! error rates and latency per route.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

/// Key shared by all requests that matched no route.
///
/// Using the raw path here would let arbitrary URLs grow the endpoint table.
const UNMATCHED_ROUTE: &str = "<unmatched>";

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = EndpointMetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(EndpointMetricsService { service }))
    }
}

pub struct EndpointMetricsService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for EndpointMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            return Box::pin(self.service.call(req));
        };

        let endpoint = endpoint_key(&req);
        let started = Instant::now();
        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;

            let failed = match &result {
                Ok(response) => counts_as_error(response.status()),
                Err(_) => true,
            };
            state.record_request(&endpoint, started.elapsed().as_millis() as u64, failed);

            result
        })
    }
}

fn endpoint_key(req: &ServiceRequest) -> String {
    let pattern = req.match_pattern();
    format!(
        "{} {}",
        req.method(),
        pattern.as_deref().unwrap_or(UNMATCHED_ROUTE)
    )
}

fn counts_as_error(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}
