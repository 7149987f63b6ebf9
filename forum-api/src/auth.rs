use crate::{validate_field, Error, User};

const CREDENTIAL_MAX_LEN: usize = 255;

/// Session token handed out by the auth API
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AuthToken(pub String);

/// Login request, `identifier` being either a username or an email
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewSession {
    pub identifier: String,
    pub password: String,
}

impl NewSession {
    pub fn new(identifier: String, password: String) -> NewSession {
        NewSession {
            identifier: identifier.trim().to_string(),
            password,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_field("identifier", &self.identifier, CREDENTIAL_MAX_LEN)?;
        validate_field("password", &self.password, CREDENTIAL_MAX_LEN)?;
        Ok(())
    }
}

/// Registration request
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: String, email: String, password: String) -> NewUser {
        NewUser {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_field("username", &self.username, CREDENTIAL_MAX_LEN)?;
        validate_field("email", &self.email, CREDENTIAL_MAX_LEN)?;
        validate_email(&self.email)?;
        validate_field("password", &self.password, CREDENTIAL_MAX_LEN)?;
        Ok(())
    }
}

/// Answer to both login and registration
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthResponse {
    pub jwt: AuthToken,
    pub user: User,
}

/// Rejects addresses that could not possibly be delivered to
///
/// This only catches typos: one `@`, a non-empty local part, and a dotted
/// domain with no empty label.
pub fn validate_email(email: &str) -> Result<(), Error> {
    let invalid = || Error::InvalidEmail(String::from(email));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels = domain.split('.').collect::<Vec<_>>();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}
