//! Avroplan resolves two independently evolving
//! [Apache Avro](https://avro.apache.org/docs/current/spec.html) schemas
//! against each other and drives the binary codec off the result.
//!
//! The writer schema describes the exact physical layout of the bytes; the
//! reader shape describes the logical structure the application expects. A
//! [`ResolutionPlan`] is computed once per pair and tells a single-pass
//! decoder what to do with every writer position (copy, promote, skip,
//! substitute a default) and a single-pass encoder how to place reader-named
//! values into writer order. Plans are pure data and can be shared across any
//! number of codec sessions, typically through a [`PlanCache`].
//!
//! ## Reading data written under an older schema
//!
//!```rust
//! use avroplan::{ResolutionPlan, Record, Schema, Value};
//! use std::str::FromStr;
//! use anyhow::Error;
//!
//! fn main() -> Result<(), Error> {
//!     // The layout the bytes were produced with.
//!     let writer = Schema::from_str(
//!         r##"{"type": "record", "name": "Pixel", "fields": [
//!             {"name": "x", "type": "int"},
//!             {"name": "y", "type": "int"},
//!             {"name": "alpha", "type": "int"}
//!         ]}"##,
//!     )?;
//!     // The shape this application wants: fields reordered, widened to
//!     // long, alpha dropped.
//!     let reader = Schema::from_str(
//!         r##"{"type": "record", "name": "Pixel", "fields": [
//!             {"name": "y", "type": "long"},
//!             {"name": "x", "type": "long"}
//!         ]}"##,
//!     )?;
//!
//!     // Produce bytes under the writer schema.
//!     let mut pixel = Record::new("Pixel");
//!     pixel.insert("x", 3i32)?;
//!     pixel.insert("y", 7i32)?;
//!     pixel.insert("alpha", 255i32)?;
//!     let identity = ResolutionPlan::resolve(&writer, &writer)?;
//!     let mut buf = vec![];
//!     identity.encode(&Value::Record(pixel), &mut buf)?;
//!
//!     // Decode them through the resolved plan.
//!     let plan = ResolutionPlan::resolve(&writer, &reader)?;
//!     let value = plan.decode(&mut buf.as_slice())?;
//!     if let Value::Record(rec) = value {
//!         assert_eq!(rec.fields["x"], Value::Long(3));
//!         assert_eq!(rec.fields["y"], Value::Long(7));
//!     }
//!
//!     Ok(())
//! }
//!```

#![deny(missing_docs)]
#![deny(unused_must_use)]
#![deny(rust_2018_idioms)]
#![recursion_limit = "1024"]

mod decode;
mod defaults;
mod encode;
mod error;
mod resolve;
mod schema;
mod util;
mod value;

pub use decode::ResolvingReader;
pub use encode::Encoder;
pub use error::AvroplanErr;
pub use error::AvroplanResult;
pub use resolve::PlanCache;
pub use resolve::ResolutionPlan;
pub use schema::CanonicalSchema;
pub use schema::Schema;
pub use value::Map;
pub use value::Record;
pub use value::Value;
