pub mod banks;
pub mod delete;
pub mod history;
pub mod import;
pub mod init;
pub mod take;
pub mod validate;
