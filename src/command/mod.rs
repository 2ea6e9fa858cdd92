mod login;
mod logout;
mod status;

pub use login::run_login;
pub use logout::run_logout;
pub use status::run_status;
