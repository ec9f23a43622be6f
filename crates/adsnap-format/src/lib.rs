pub mod codec;
pub mod cursor;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
pub mod reader;
pub mod schema;

pub use cursor::ByteCursor;
pub use reader::{Objects, Snapshot};
pub use schema::{AttributeDef, ClassDef, Schema};
