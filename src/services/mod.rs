pub mod auth;
pub mod catalog;
pub mod list_store;
pub mod session;
pub mod sync;

pub use auth::{IdentityProvider, SessionAuth};
pub use catalog::{CatalogClient, CatalogListing, TmdbCatalog};
pub use list_store::ListStore;
pub use session::ListSession;
pub use sync::{MemorySynchronizer, RecordSubscription, RecordSynchronizer};
