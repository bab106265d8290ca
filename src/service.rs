pub mod accounts;
pub mod students;

pub use accounts::AccountService;
pub use students::{ImportReport, Statistics, StudentService};
