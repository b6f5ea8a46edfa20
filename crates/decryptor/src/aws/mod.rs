//! AWS SDK client initialisation.
//!
//! The function only talks to the parameter store. The client is not built at
//! startup: the first key fetch constructs it, so a misconfigured region shows
//! up as a classified `InternalError` on that request instead of a crash.

pub mod clients;

pub use clients::{ClientInitError, ParameterStoreClient};
