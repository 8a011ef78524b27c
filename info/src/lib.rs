//! Build metadata shared by the server binaries and the admin listener.

pub const NAME: &str = "tracker";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The source revision, if the build environment provided one.
pub const REVISION: Option<&str> = option_env!("TRACKER_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("TRACKER_BUILD_TIMESTAMP");
