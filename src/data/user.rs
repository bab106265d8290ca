use crate::{
    auth::PermissionsTarget,
    error::{EmailSnafu, MakeQuerySnafu, RosterResult},
};
use axum_login::AuthUser;
use chrono::NaiveDateTime;
use email_address::EmailAddress;
use maud::Render;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::PgConnection;
use std::{fmt, str::FromStr};

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_PERSONAL_NAME_LEN: usize = 50;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    /// Anything the database holds that isn't `ADMIN` gets the ordinary role.
    pub fn from_db(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("ADMIN") {
            Self::Admin
        } else {
            Self::User
        }
    }

    pub fn permissions(self) -> PermissionsTarget {
        match self {
            Self::User => {
                PermissionsTarget::VIEW_STUDENTS
                    | PermissionsTarget::CRUD_STUDENTS
                    | PermissionsTarget::EXPORT_FILES
            }
            Self::Admin => PermissionsTarget::all(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub bcrypt_hashed_password: SecretString,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password_hash: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = crate::error::RosterError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            username: row.username,
            email: EmailAddress::from_str(&row.email).context(EmailSnafu)?,
            first_name: row.first_name,
            last_name: row.last_name,
            role: Role::from_db(&row.role),
            bcrypt_hashed_password: SecretString::from(row.password_hash),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct AddUser {
    pub username: String,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub bcrypt_hashed_password: String,
}

const USER_COLUMNS: &str =
    "id, username, password_hash, email, first_name, last_name, role, created_at, updated_at";

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    pub fn get_permissions(&self) -> PermissionsTarget {
        self.role.permissions()
    }

    pub async fn get_from_db_by_id(id: i32, conn: &mut PgConnection) -> RosterResult<Option<Self>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM public.app_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .context(MakeQuerySnafu)?
        .map(Self::try_from)
        .transpose()
    }

    pub async fn get_from_db_by_username(
        username: &str,
        conn: &mut PgConnection,
    ) -> RosterResult<Option<Self>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM public.app_user WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(conn)
        .await
        .context(MakeQuerySnafu)?
        .map(Self::try_from)
        .transpose()
    }

    pub async fn username_exists(username: &str, conn: &mut PgConnection) -> RosterResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM public.app_user WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    pub async fn email_exists(email: &str, conn: &mut PgConnection) -> RosterResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM public.app_user WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    pub async fn count(conn: &mut PgConnection) -> RosterResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM public.app_user")
            .fetch_one(conn)
            .await
            .context(MakeQuerySnafu)
    }

    pub async fn insert_into_database(
        to_be_added: AddUser,
        conn: &mut PgConnection,
    ) -> RosterResult<Self> {
        let AddUser {
            username,
            email,
            first_name,
            last_name,
            role,
            bcrypt_hashed_password,
        } = to_be_added;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO public.app_user (username, password_hash, email, first_name, last_name, role) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(bcrypt_hashed_password)
        .bind(email.as_str())
        .bind(first_name)
        .bind(last_name)
        .bind(role.as_str())
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)?;

        Self::try_from(row)
    }

    pub async fn set_password_hash(
        id: i32,
        bcrypt_hashed_password: &str,
        conn: &mut PgConnection,
    ) -> RosterResult<bool> {
        let result = sqlx::query(
            "UPDATE public.app_user SET password_hash = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(bcrypt_hashed_password)
        .execute(conn)
        .await
        .context(MakeQuerySnafu)?;
        Ok(result.rows_affected() > 0)
    }
}

impl Render for User {
    fn render_to(&self, buffer: &mut String) {
        self.full_name().render_to(buffer);
    }
}

impl AuthUser for User {
    type Id = i32;

    fn id(&self) -> Self::Id {
        self.id
    }

    //changing the password invalidates every other session
    fn session_auth_hash(&self) -> &[u8] {
        self.bcrypt_hashed_password.expose_secret().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_from_the_database() {
        assert_eq!(Role::from_db("ADMIN"), Role::Admin);
        assert_eq!(Role::from_db(" admin "), Role::Admin);
        assert_eq!(Role::from_db("USER"), Role::User);
        assert_eq!(Role::from_db("superuser"), Role::User);
    }

    #[test]
    fn only_admins_import() {
        assert!(!Role::User.permissions().contains(PermissionsTarget::IMPORT_FILES));
        assert!(Role::User.permissions().contains(PermissionsTarget::EXPORT_FILES));
        assert!(Role::Admin.permissions().contains(PermissionsTarget::IMPORT_FILES));
    }
}
