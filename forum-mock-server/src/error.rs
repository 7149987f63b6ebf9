use forum_client::api::Error as ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn unauthorized() -> Error {
        Error::Api(ApiError::Unauthorized)
    }

    pub fn forbidden() -> Error {
        Error::Api(ApiError::Forbidden)
    }

    pub fn not_found(what: String) -> Error {
        Error::Api(ApiError::NotFound(what))
    }

    pub fn invalid(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::Validation(msg.into()))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err = ApiError::Unknown {
                    status: 500,
                    message: String::from("Internal server error, see logs for details"),
                };
                #[cfg(test)]
                let err = ApiError::Unknown {
                    status: 500,
                    message: format!("Internal server error: {err:?}"),
                };
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (
            err.status_code(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            err.contents(),
        )
            .into_response()
    }
}
