//! Cursor-based binary archive.
//!
//! Every RPC payload in sparseps is a [`BinaryArchive`]: a growable byte
//! buffer written sequentially with typed `put_*` calls and read back with a
//! cursor that is decoupled from the write high-watermark, so the same buffer
//! can be filled once and then consumed.
//!
//! Primitives are copied with their native in-memory byte order. The format
//! is therefore **not portable across hosts of differing endianness**; all
//! ranks of a training job are assumed to share one architecture.
//!
//! # Example
//!
//! ```
//! use sparseps_archive::BinaryArchive;
//!
//! let mut ar = BinaryArchive::new();
//! ar.put_u64(42);
//! ar.put_vec(&[1.0f32, 2.0]);
//!
//! let mut rd = BinaryArchive::from_bytes(ar.as_bytes().to_vec());
//! assert_eq!(rd.get_u64().unwrap(), 42);
//! assert_eq!(rd.get_vec::<f32>().unwrap(), vec![1.0, 2.0]);
//! ```

mod archive;
mod error;

pub use archive::{Archivable, BinaryArchive};
pub use error::{ArchiveError, Result};
