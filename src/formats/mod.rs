//! Parsers and decoders for cooked resource formats.
//!
//! * **Packages** ([`pak`]) are parsed from any [`std::io::Read`] +
//!   [`std::io::Seek`] source and only describe where resources live;
//!   resource bytes are never loaded while parsing.
//! * **Resources** ([`txtr`], [`anim`], [`deps`]) decode from an in-memory byte slice
//!   that has already been decompressed with [`crate::compression`].
//!
//! ## Format overview
//!
//! | Module    | Format | Description |
//! |-----------|--------|-------------|
//! | [`pak`]   | PAK    | Package of named and anonymous resources, two layout generations |
//! | [`texel`] | -      | GX texel format table and pixel conversions |
//! | [`txtr`]  | TXTR   | Texture with a mip chain in one of eleven GX texel formats |
//! | [`anim`]  | ANIM   | Skeletal animation, uncompressed or bit-packed |
//! | [`deps`]  | EVNT, CSNG, HINT, MAPW, MAPU, RULE | Dependency lists only |

pub mod anim;
pub mod deps;
pub mod pak;
pub mod texel;
pub mod txtr;
