pub mod user_service;
pub mod wallet_service;

pub use user_service::{AuthError, PasswordPolicy, UserService};
pub use wallet_service::{WalletError, WalletService};
