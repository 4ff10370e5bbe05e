// File: lectern-sync/src/lib.rs
// Purpose: Main entry point for the lectern-sync library

//! # lectern-sync
//!
//! The two client synchronization protocols of the reading platform.
//!
//! - **Cache validation**: a client sends the ids it holds for one entity
//!   kind plus a watermark, and learns which records changed and which no
//!   longer exist.
//! - **Annotation sync**: a client sends a batch of highlights, bookmarks or
//!   notes for one book; new items get server ids, existing ones are updated
//!   or soft-deleted.
//!
//! ```rust,ignore
//! use lectern::entity;
//! use lectern_sync::{cache, annotation::{self, AnnotationKind}};
//!
//! let result = cache::validate_cache(&pool, &entity::AUTHOR, &[1, 2, 3], since).await?;
//! let synced = annotation::sync(&pool, AnnotationKind::Note, user_id, book_id, items).await?;
//! ```

pub mod annotation;
pub mod cache;
pub mod statements;

pub use annotation::{AnnotationKind, IdPair, ItemPatch, SyncRequest, SyncResult};
pub use cache::{CacheRequest, CacheValidation};
