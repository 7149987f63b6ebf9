use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use forum_client::api::AuthToken;

use crate::{Error, Shared};

/// Bearer token of the request, not yet checked against the known sessions
pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        let auth = req
            .headers
            .get(http::header::AUTHORIZATION)
            .ok_or_else(Error::unauthorized)?;
        let auth = auth.to_str().map_err(|_| Error::unauthorized())?;
        let mut auth = auth.split(' ');
        if !auth
            .next()
            .ok_or_else(Error::unauthorized)?
            .eq_ignore_ascii_case("bearer")
        {
            return Err(Error::unauthorized());
        }
        let token = auth.next().ok_or_else(Error::unauthorized)?;
        if token.is_empty() || auth.next().is_some() {
            return Err(Error::unauthorized());
        }
        Ok(PreAuth(AuthToken(String::from(token))))
    }
}

/// Bearer token belonging to a known session
pub struct Auth(pub AuthToken);

#[async_trait]
impl FromRequestParts<Shared> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &Shared) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        state.lock().await.me(&token)?;
        Ok(Auth(token))
    }
}
