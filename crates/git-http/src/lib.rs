//! Git Smart HTTP transport and the Git LFS batch/basic-transfer API.
//!
//! Pack negotiation and object encoding are delegated to the `git` binary;
//! this crate handles routing, authorization, lazy repository creation,
//! process plumbing and LFS object storage. Hosts plug in through
//! [`GitHttpState`].

pub mod auth;
pub mod dumb;
pub mod errors;
pub mod init;
pub mod lfs;
pub mod pkt;
pub mod process;
pub mod refs;
pub mod repo;
pub mod router;
pub mod rpc;
pub mod service;
pub mod state;

pub use auth::{AuthIdentity, TokenValidator};
pub use errors::GitHttpError;
pub use init::RepoInitializer;
pub use lfs::{FsObjectStore, ObjectStore};
pub use repo::{Repository, RepositoryProvider, Visibility};
pub use router::router;
pub use state::GitHttpState;
