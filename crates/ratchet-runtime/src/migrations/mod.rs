mod loader;
mod runner;

pub use loader::{
    load_migrations, load_migrations_from_dir, parse_file_name, DirSource, MemorySource,
    MigrationSource, SourceEntry,
};
pub use runner::{MigrationRunner, MigrationStatus};
