//! goprovider - Terraform/OpenTofu functions written in Go
//!
//! The provider is configured with the source of a Go file declaring
//! `package lib`. Its exported functions are interpreted in-process and
//! published as provider functions, callable as
//! `provider::go::<lowercased name>(...)`.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod configure;
pub mod mapper;
pub mod provider;

pub use adapter::{adapt, GoFunction};
pub use config::ProviderConfig;
pub use configure::LIB_PACKAGE;
pub use provider::{GoProvider, PROVIDER_ADDRESS};
