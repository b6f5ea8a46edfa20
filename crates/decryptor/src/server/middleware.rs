//! Limits applied by the router's middleware layers.

use std::time::Duration;

/// Upper bound on one invocation, key fetch included.
///
/// The key fetch has its own, shorter timeout; this only catches a stuck
/// handler. The platform gives up on a function after 8 seconds.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
