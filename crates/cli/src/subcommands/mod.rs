pub mod add;
pub mod commit;
pub mod commit_log;
pub mod init;
pub mod reset;
pub mod status;
