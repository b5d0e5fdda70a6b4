pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::login;

pub mod root;
