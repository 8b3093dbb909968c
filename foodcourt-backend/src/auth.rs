use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::header;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use foodcourt_entitlement::{AdminGateway, Caller};

use crate::error::AppError;

/// The capability of the requesting client. Requests without an
/// `Authorization` header are anonymous; presented credentials must be
/// valid or the request is rejected.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    AdminGateway: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(Self(Caller::Anonymous));
        }
        let TypedHeader(Authorization(basic)) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state)
                .await
                .map_err(|_rejection| AppError::MalformedCredentials)?;
        let gateway = AdminGateway::from_ref(state);
        let caller = gateway
            .authenticate(basic.username(), basic.password())
            .await?;
        Ok(Self(caller))
    }
}
