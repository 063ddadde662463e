//! Input deck: the XML files the transport engine reads, plus a manifest.
//!
//! Layout inside the deck directory:
//! ```text
//! materials.xml       - nuclide compositions, densities, S(a,b) tables
//! geometry.xml        - surfaces and cells
//! settings.xml        - run mode, batches, particles, source
//! tallies.xml         - filters and tallies
//! deck.manifest.json  - schema version and sha256 per XML file
//! ```
//!
//! # Invariants
//! - Writing then reading a deck yields the expanded model unchanged.
//! - A deck whose files no longer match the manifest hashes is rejected.

mod error;
mod manifest;
mod reader;
mod writer;
mod xml;

pub use error::DeckError;
pub use manifest::{DeckManifest, ManifestEntry, MANIFEST_FILE, verify_manifest};
pub use reader::read_deck;
pub use writer::{geometry_xml, materials_xml, settings_xml, tallies_xml, write_deck};

pub const MATERIALS_FILE: &str = "materials.xml";
pub const GEOMETRY_FILE: &str = "geometry.xml";
pub const SETTINGS_FILE: &str = "settings.xml";
pub const TALLIES_FILE: &str = "tallies.xml";

/// Deck files in the order they are written.
pub const DECK_FILES: [&str; 4] = [MATERIALS_FILE, GEOMETRY_FILE, SETTINGS_FILE, TALLIES_FILE];
