use crate::{
    auth::backend::RosterAuthBackend,
    data::user::User,
    error::{IncorrectPermissionsSnafu, RosterResult, UnableToFindUserInfoSnafu},
};
use axum_login::AuthSession;
use bitflags::bitflags;
use snafu::{OptionExt, ensure};

pub mod backend;
pub mod postgres_store;

pub type RosterSession = AuthSession<RosterAuthBackend>;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PermissionsTarget: u8 {
        const VIEW_STUDENTS = 0b0000_0001;
        const CRUD_STUDENTS = 0b0000_0010;
        const EXPORT_FILES =  0b0000_0100;
        const IMPORT_FILES =  0b0000_1000;
    }
}

pub trait AuthUtilities {
    fn logged_in_user(&self) -> RosterResult<&User>;
    fn can(&self, needed: PermissionsTarget) -> bool;
    fn ensure_can(&self, needed: PermissionsTarget) -> RosterResult<()>;
}

impl AuthUtilities for RosterSession {
    fn logged_in_user(&self) -> RosterResult<&User> {
        self.user.as_ref().context(UnableToFindUserInfoSnafu)
    }

    fn can(&self, needed: PermissionsTarget) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.get_permissions().contains(needed))
    }

    fn ensure_can(&self, needed: PermissionsTarget) -> RosterResult<()> {
        let found = self.logged_in_user()?.get_permissions();
        ensure!(
            found.contains(needed),
            IncorrectPermissionsSnafu { needed, found }
        );
        Ok(())
    }
}
