//! Password hashing and symmetric field encryption.

pub mod cipher;
pub mod password;

pub use cipher::FieldCipher;
pub use password::PasswordHasher;
