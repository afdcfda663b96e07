//! Avatar rendering selector.
//!
//! Exposes one `render` capability over interchangeable remote backends
//! (HeyGen, D-ID). Each backend is driven through the same
//! submit, bounded poll, download sequence. When a render errors or never
//! finishes, a cached placeholder clip for the persona is used instead.

pub mod backend;
pub mod config;
pub mod did;
pub mod error;
pub mod heygen;
pub mod selector;

pub use backend::{PollPolicy, RenderBackend, RenderRequest, RenderStatus};
pub use config::{AvatarConfig, BackendConfig};
pub use did::DIdBackend;
pub use error::{AvatarError, AvatarResult};
pub use heygen::HeyGenBackend;
pub use selector::{AvatarRenderer, AvatarSelector, RenderOutcome, RenderedClip};
