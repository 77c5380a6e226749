//! Bundle serialization for the Bungae bundler.
//!
//! Turns a built dependency graph into the final byte stream and its
//! composed source map, owns the per-configuration build sessions, produces
//! HMR update messages from graph deltas, and symbolicates runtime stack
//! traces against composed maps.

mod error;
mod hmr;
mod prelude;
mod serializer;
mod session;
pub mod sourcemap;
mod symbolicate;

pub use error::{Result, SerializeError};
pub use hmr::{
    build_update, HmrClientMessage, HmrErrorBody, HmrModuleEntry, HmrServerMessage, HmrUpdate,
    UpdateStartBody,
};
pub use prelude::{fill_prepend, prelude_source, BUNDLE_MARKER, RUNTIME_SOURCE};
pub use serializer::{
    inline_map_comment, is_ignored_source, map_source_name, output_file_name, serialize,
    splice_tail, verbose_name, BundleOutput, SerializeOptions,
};
pub use session::{BuildSession, CachedBundle};
pub use sourcemap::{compose, ModuleMapInput, OriginalPosition, SourceMap, SourceMapConsumer};
pub use symbolicate::{
    code_frame, symbolicate_frame, translate_virtual_source, CodeFrame, CodeFrameLocation,
    StackFrame,
};
