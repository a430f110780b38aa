//! # focuscrop
//!
//! Crops photographs to a fixed 2:3 or 3:2 frame around a focus point while
//! keeping as much of the source's fidelity as its container allows: 16-bit
//! TIFFs stay 16-bit TIFFs, ICC profiles are reattached verbatim, and EXIF
//! orientation is applied to the pixels before the crop is computed.
//!
//! # Architecture: One Request, Five Steps
//!
//! ```text
//! read metadata → normalize orientation → compute crop box → plan encoding → write
//! ```
//!
//! Only the first and last steps touch codecs; they sit behind the
//! [`imaging::ImageBackend`] trait. Everything in between is pure and unit
//! tested without files.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The crop engine: decode, orientation, geometry, encoding policy, encode, reports |
//! | [`storage`] | Upload intake, output naming, cleanup by name and TTL sweep |
//! | [`config`] | `focuscrop.toml` loading, validation and merging onto stock defaults |
//! | [`output`] | CLI output formatting for every subcommand |
//!
//! # Design Decisions
//!
//! ## Format Follows Source
//!
//! The output container is chosen from the source container and its pixel
//! depth, never from the requested file name. A `.heic` hint becomes `.jpg`,
//! an 8-bit TIFF becomes a JPEG and a 16-bit TIFF stays a losslessly
//! compressed TIFF. The policy is a single `match` in [`imaging::policy`].
//!
//! ## Metadata As Opaque Bytes
//!
//! ICC profiles and EXIF blocks are carried as raw buffers. The only edit
//! ever made is rewriting the EXIF orientation tag to 1 after the pixels
//! have been rotated, so viewers do not rotate the crop a second time.
//!
//! ## HEIC Is Opt-In
//!
//! HEIC decoding needs the system libheif and is compiled only with the
//! `heif` feature. Which decoders exist is recorded once at startup in
//! [`imaging::codecs`]; without libheif, HEIC files fail with a decode
//! error naming the missing decoder.

pub mod config;
pub mod imaging;
pub mod output;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
