use crate::{data::user::User, error::RosterError, state::RosterState};
use async_trait::async_trait;
use axum_login::{AuthnBackend, UserId};
use secrecy::SecretString;

#[derive(Clone, Debug)]
pub struct RosterAuthBackend {
    state: RosterState,
}

impl RosterAuthBackend {
    pub const fn new(state: RosterState) -> Self {
        Self { state }
    }
}

#[derive(Clone)]
pub struct RosterAuthCredentials {
    pub username: String,
    pub password: SecretString,
}

#[async_trait]
impl AuthnBackend for RosterAuthBackend {
    type User = User;
    type Credentials = RosterAuthCredentials;
    type Error = RosterError;

    async fn authenticate(
        &self,
        RosterAuthCredentials { username, password }: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        self.state.accounts().authenticate(&username, password).await
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        self.state.accounts().get_user(*user_id).await
    }
}
