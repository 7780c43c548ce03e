mod factory;
mod postgres;
mod sqlite;
pub mod taste;
mod traits;

pub use factory::create_storage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use traits::{
    EndingStyle, NewPoemVersion, NewRating, Person, PoemVersion, RatedVersion, Rating, RhymeTag,
    Storage, TasteProfile, VersionAverage, VersionStage,
};
