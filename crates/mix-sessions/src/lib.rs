//! Audio Session Routing
//!
//! This crate keeps a cache of the host's audio sessions and routes control
//! surface events to them:
//!
//! - **Session traits**: the platform backend seam ([`Session`], [`SessionFinder`], [`AudioPlatform`])
//! - **SessionMap**: the key to sessions cache, guarded by a single lock
//! - **Targets**: configured names, including `mix.current` and `mix.unmapped`
//! - **SessionRouter**: applies slider, mute and output device events with
//!   debounced, staleness-bounded refreshes

pub mod error;
pub mod map;
pub mod policy;
pub mod router;
pub mod session;
pub mod target;

pub use error::{PlatformError, RoutingError, SessionError};
pub use map::{SessionMap, SessionSnapshot};
pub use policy::RefreshPolicy;
pub use router::SessionRouter;
pub use session::{AudioPlatform, DeviceEndpoint, Session, SessionFinder};
pub use target::{is_session_mapped, SpecialTarget, Target, SPECIAL_TARGET_PREFIX};
