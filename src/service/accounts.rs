use crate::{
    data::user::{AddUser, MAX_PERSONAL_NAME_LEN, MAX_USERNAME_LEN, Role, User},
    error::{
        BcryptSnafu, EmailSnafu, EmailTakenSnafu, GetDatabaseConnectionSnafu, JoinTaskSnafu,
        MissingUserSnafu, RosterResult, UsernameTakenSnafu, ValidationSnafu,
    },
};
use bcrypt::DEFAULT_COST;
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, ensure};
use sqlx::{Pool, Postgres, pool::PoolConnection};
use std::str::FromStr;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 100;

/// Everything wrong with `password`, empty if it's acceptable.
pub fn password_problems(password: &str) -> Vec<String> {
    let len = password.chars().count();
    if len == 0 {
        return vec!["Password is required".into()];
    }

    let mut problems = vec![];
    if len < MIN_PASSWORD_LEN {
        problems.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if len > MAX_PASSWORD_LEN {
        problems.push(format!(
            "Password cannot be longer than {MAX_PASSWORD_LEN} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        problems.push("Password must contain at least one letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least one digit".into());
    }
    problems
}

#[derive(Deserialize)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

impl RegistrationForm {
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = vec![];

        let mut check = |value: &str, what: &str, max: usize| {
            let value = value.trim();
            if value.is_empty() {
                errors.push(format!("{what} is required"));
            } else if value.chars().count() > max {
                errors.push(format!("{what} cannot be longer than {max} characters"));
            }
        };
        check(&self.username, "Username", MAX_USERNAME_LEN);
        check(&self.first_name, "First name", MAX_PERSONAL_NAME_LEN);
        check(&self.last_name, "Last name", MAX_PERSONAL_NAME_LEN);

        if self.email.trim().is_empty() {
            errors.push("Email is required".into());
        } else if !EmailAddress::is_valid(self.email.trim()) {
            errors.push("Email is not a valid address".into());
        }

        errors.extend(password_problems(self.password.expose_secret()));
        if self.password.expose_secret() != self.confirm_password.expose_secret() {
            errors.push("Passwords do not match".into());
        }

        errors
    }
}

/// Checks `password` against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(
    password: SecretString,
    bcrypt_hashed_password: SecretString,
) -> RosterResult<bool> {
    tokio::task::spawn_blocking(move || {
        bcrypt::verify(
            password.expose_secret(),
            bcrypt_hashed_password.expose_secret(),
        )
    })
    .await
    .context(JoinTaskSnafu)?
    .context(BcryptSnafu)
}

async fn hash_password(password: SecretString) -> RosterResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), DEFAULT_COST))
        .await
        .context(JoinTaskSnafu)?
        .context(BcryptSnafu)
}

#[derive(Debug, Clone)]
pub struct AccountService {
    pool: Pool<Postgres>,
}

impl AccountService {
    pub const fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> RosterResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    /// The very first account gets admin rights, everyone after is an ordinary user.
    pub async fn register(&self, form: RegistrationForm) -> RosterResult<User> {
        let reasons = form.validation_errors();
        ensure!(reasons.is_empty(), ValidationSnafu { reasons });

        let username = form.username.trim().to_string();
        let email = form.email.trim().to_string();
        let mut conn = self.connection().await?;

        ensure!(
            !User::username_exists(&username, &mut conn).await?,
            UsernameTakenSnafu { username }
        );
        ensure!(
            !User::email_exists(&email, &mut conn).await?,
            EmailTakenSnafu { email }
        );

        let email = EmailAddress::from_str(&email).context(EmailSnafu)?;
        let bcrypt_hashed_password = hash_password(form.password).await?;
        let role = if User::count(&mut conn).await? == 0 {
            Role::Admin
        } else {
            Role::User
        };

        let user = User::insert_into_database(
            AddUser {
                username,
                email,
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                role,
                bcrypt_hashed_password,
            },
            &mut conn,
        )
        .await?;
        info!(id = user.id, username = %user.username, %role, "Registered account");

        Ok(user)
    }

    /// `None` for blank input, unknown usernames and wrong passwords alike.
    pub async fn authenticate(
        &self,
        username: &str,
        password: SecretString,
    ) -> RosterResult<Option<User>> {
        let username = username.trim();
        if username.is_empty() || password.expose_secret().trim().is_empty() {
            warn!("Login attempted with empty credentials");
            return Ok(None);
        }

        let mut conn = self.connection().await?;
        let Some(user) = User::get_from_db_by_username(username, &mut conn).await? else {
            warn!(?username, "Login attempted for unknown user");
            return Ok(None);
        };

        if verify_password(password, user.bcrypt_hashed_password.clone()).await? {
            info!(?username, "Logged in");
            Ok(Some(user))
        } else {
            warn!(?username, "Wrong password");
            Ok(None)
        }
    }

    pub async fn get_user(&self, id: i32) -> RosterResult<Option<User>> {
        User::get_from_db_by_id(id, &mut *self.connection().await?).await
    }

    pub async fn change_password(
        &self,
        id: i32,
        current: SecretString,
        new: SecretString,
        confirm: SecretString,
    ) -> RosterResult<()> {
        let mut reasons = password_problems(new.expose_secret());
        if new.expose_secret() != confirm.expose_secret() {
            reasons.push("Passwords do not match".into());
        }
        ensure!(reasons.is_empty(), ValidationSnafu { reasons });

        let mut conn = self.connection().await?;
        let user = User::get_from_db_by_id(id, &mut conn)
            .await?
            .context(MissingUserSnafu { id })?;

        ensure!(
            verify_password(current, user.bcrypt_hashed_password.clone()).await?,
            ValidationSnafu {
                reasons: vec!["Current password is incorrect".to_string()]
            }
        );

        let hashed = hash_password(new).await?;
        ensure!(
            User::set_password_hash(id, &hashed, &mut conn).await?,
            MissingUserSnafu { id }
        );
        info!(id, username = %user.username, "Changed password");

        Ok(())
    }

    pub async fn is_username_available(&self, username: &str) -> RosterResult<bool> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(false);
        }
        Ok(!User::username_exists(username, &mut *self.connection().await?).await?)
    }

    pub async fn is_email_available(&self, email: &str) -> RosterResult<bool> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(false);
        }
        Ok(!User::email_exists(email, &mut *self.connection().await?).await?)
    }
}
