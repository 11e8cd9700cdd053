pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryEntityStore, MemoryRecipientDirectory};
pub use postgres::{PgEntityStore, PgRecipientDirectory};
pub use traits::{AddOutcome, ClearOutcome, DeleteOutcome, EntityStore, RecipientDirectory};
