//! **retrokit** - a reusable Rust library for unpacking cooked game resources
//! from the `.pak` packages of a family of GameCube/Wii-era titles.
//!
//! # Pipeline
//! 1. [`index::ResourceIndex`] parses every package of a game and maps each
//!    [`types::AssetId`] to the first [`formats::pak::ResourceRecord`] seen.
//! 2. [`compression::read_payload`] loads and decompresses one record.
//! 3. [`store::ResourceStore`] dispatches the bytes to a decoder and caches
//!    the result.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::pak`]   | PAK - package container (Legacy and Modern) |
//! | [`compression`]    | zlib, segmented zlib/LZO1X, `CMPD` blocks |
//! | [`formats::txtr`]  | TXTR - GX texture |
//! | [`formats::anim`]  | ANIM - skeletal animation |
//! | [`formats::deps`]  | dependency lists of otherwise raw resources |

pub mod bits;
pub mod compression;
pub mod error;
pub mod formats;
pub mod game;
pub mod index;
pub mod store;
pub mod types;
pub(crate) mod utils;

pub use error::{Error, Result};
pub use game::Game;
pub use index::ResourceIndex;
pub use store::{ExtractOptions, ExtractReport, Resource, ResourceLookup, ResourceStore};
pub use types::{AssetId, FourCC};
