//! Route modules for Docshift Server

pub mod compress;
pub mod convert;
pub mod health;
pub mod respond;
