//! # Otter Interop
//!
//! Exposes host objects to scripts and script values to the host.
//!
//! ## Layers
//!
//! - **Registration**: host classes declare fields, methods and
//!   constructors through [`HostClass::builder`]
//! - **Descriptors**: per-class member tables, built once per
//!   `(class, mode)` and shared through the [`DescriptorRegistry`]
//! - **Scoring**: overload resolution ranks candidates by how well each
//!   argument fits its parameter
//! - **Proxies**: trap handlers answering property access on host
//!   objects, classes, maps and capability objects
//! - **Conversion**: recursive value conversion with cycle-safe depth limits
//!
//! The bridge is engine-agnostic: everything runs against the
//! [`ScriptEngine`] capability trait. [`InMemoryEngine`] is a complete
//! implementation used by the test suite.
//!
//! ```
//! use otter_interop::{Bridge, HostValue, InMemoryEngine};
//!
//! let engine = InMemoryEngine::new();
//! let bridge = Bridge::new();
//! let value = bridge.to_script(&engine, &HostValue::Int(7)).unwrap();
//! assert_eq!(bridge.to_host(&engine, &value).unwrap(), HostValue::Int(7));
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod bridge;
pub mod collection;
pub mod collections;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod host;
pub mod naming;
pub mod polyfill;
pub mod proxy;
pub mod registration;
pub mod scorer;
pub mod script;
pub mod symbols;
pub mod types;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use descriptor::{ClassDescriptor, ConversionMode, DescriptorRegistry, ProxyMode, TargetKind};
pub use dispatch::{CallbackContext, CallbackKind, CallbackTable};
pub use engine::memory::InMemoryEngine;
pub use engine::{BuiltinPrototype, Scoped, ScopedList, ScriptEngine};
pub use error::{InteropError, InteropResult};
pub use host::{DirectTarget, HostArray, HostList, HostMap, HostObject, HostSet, HostValue};
pub use proxy::{DirectProxy, ProxyHandler};
pub use registration::{Callable, ClassBuilder, Field, HostCall, HostClass};
pub use script::{ScriptKind, ScriptSymbol, ScriptValue};
pub use types::{ClassId, HostType};
