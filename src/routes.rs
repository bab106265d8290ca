pub mod import_export;
pub mod index;
pub mod login;
pub mod profile;
pub mod register;
pub mod sse;
pub mod students;
