pub mod archiver;
pub mod staging;
pub mod transfer;
