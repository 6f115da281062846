//! Bearer token middleware.
//!
//! Wrap any scope that requires an authenticated user with [`JwtMiddlewareFactory`]. The middleware validates the
//! `Authorization: Bearer <token>` header and inserts the [`JwtClaims`] into the request extensions. Requests without
//! a valid token are answered with 401 and never reach the handler.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::TokenValidator,
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    validator: TokenValidator,
}

impl JwtMiddlewareFactory {
    pub fn new(validator: TokenValidator) -> Self {
        JwtMiddlewareFactory { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { validator: Rc::new(self.validator.clone()), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    validator: Rc<TokenValidator>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let validator = Rc::clone(&self.validator);
        Box::pin(async move {
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(TokenValidator::extract_from_header)
                .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
            let claims = validator.validate(header).map_err(|e| {
                debug!("🔐️ Rejected access token for {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ User #{} authenticated for {}", claims.sub, req.path());
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
