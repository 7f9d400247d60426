//! Saved-objects CRUD contract, the base repository and the wrapper pipeline.

pub(crate) mod bulk;
mod client;
pub mod provider;
pub mod repository;
mod types;

pub use client::SavedObjectsClient;
pub use provider::{
    ClientWrapper, ClientWrapperFactory, SavedObjectsClientProvider, WrappedClient,
    WrapperOptions,
};
pub use repository::SavedObjectsRepository;
pub use types::*;
