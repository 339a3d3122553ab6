pub mod events;
pub mod history;
pub mod records;
pub mod save;
pub mod snapshots;

pub use events::{memory_owner_rule, OwnerRule};
pub use records::*;
pub use save::{decode_turn_tag, player_id_from_index, SaveGame};
