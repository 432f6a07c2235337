/// Admin guard middleware
///
/// Runs `AdminAuthGate::guard` before the wrapped handler. On success the
/// resolved `Session` is put into request extensions; on failure the
/// request short-circuits with the matching `AppError` response.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AdminAuthGate;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// Privilege a guarded route demands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Staff or superuser
    Admin,
    Superuser,
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub struct AdminGuard {
    gate: AdminAuthGate,
    privilege: Privilege,
}

impl AdminGuard {
    /// Require a staff or superuser access token
    pub fn new(gate: AdminAuthGate) -> Self {
        Self {
            gate,
            privilege: Privilege::Admin,
        }
    }

    /// Require a superuser access token
    pub fn superuser(gate: AdminAuthGate) -> Self {
        Self {
            gate,
            privilege: Privilege::Superuser,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AdminGuardService {
            service: Rc::new(service),
            gate: self.gate.clone(),
            privilege: self.privilege,
        }))
    }
}

pub struct AdminGuardService<S> {
    service: Rc<S>,
    gate: AdminAuthGate,
    privilege: Privilege,
}

impl<S> AdminGuardService<S> {
    fn authorize(&self, req: &ServiceRequest) -> Result<crate::auth::Session, AppError> {
        let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;

        match self.privilege {
            Privilege::Admin => self.gate.guard(token),
            Privilege::Superuser => self.gate.guard_superuser(token),
        }
    }
}

impl<S, B> Service<ServiceRequest> for AdminGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.authorize(&req) {
            Ok(session) => {
                tracing::debug!(
                    user_id = session.principal.id,
                    jti = %session.claims.jti,
                    path = %req.path(),
                    "Admin session resolved"
                );
                req.extensions_mut().insert(session);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
