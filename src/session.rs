use crate::models::Owner;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};

pub const USER_ID_HEADER: &str = "x-user-id";

/// A signed-in user as presented by the client: the backend access token and
/// the user id it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn owner(&self) -> Owner {
        Owner::User(self.user_id.clone())
    }

    pub fn from_parts(parts: &Parts) -> Option<Self> {
        let access_token = parts
            .headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();
        let user_id = parts.headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
        if access_token.is_empty() || user_id.is_empty() {
            return None;
        }
        Some(Self {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

/// Extracting `Option<Session>` yields `None` for anonymous requests.
#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts).ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_and_user_id_make_a_session() {
        let session = Session::from_parts(&parts(&[
            ("authorization", "Bearer abc"),
            ("x-user-id", "user-1"),
        ]))
        .unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token, "abc");
    }

    #[test]
    fn partial_credentials_are_anonymous() {
        assert!(Session::from_parts(&parts(&[("authorization", "Bearer abc")])).is_none());
        assert!(Session::from_parts(&parts(&[("x-user-id", "user-1")])).is_none());
        assert!(Session::from_parts(&parts(&[
            ("authorization", "Basic abc"),
            ("x-user-id", "user-1"),
        ]))
        .is_none());
    }
}
