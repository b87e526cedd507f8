//! Catharsys Product Scanner
//!
//! Scans the file-system output of render-production jobs against declarative
//! path structures, and serves availability analysis, category tagging and
//! multi-dimensional view iteration over the results.
//!
//! ## Features
//!
//! - **Declarative path structures**: `/`-delimited patterns with fixed,
//!   user-capture, regex and system-enumerator segments
//! - **Generic scan tree**: one owning arena tree per group, serializable to
//!   a JSON scan cache keyed by project and production-file timestamp
//! - **Cross-product enumeration**: observed variable values per level, with
//!   union semantics across artefact types sharing a variable
//! - **Availability analysis**: structured missing-artefact reports against
//!   requested value combinations
//! - **Views**: odometer dimensions over group, common and per-type artefact
//!   variables, with specificity-ranked category overrides
//!
//! ## Architecture
//!
//! ```text
//! production-root/
//! ├── cam_front/              ?camera     (group structure)
//! │   └── rq/                 fixed
//! │       ├── img/            fixed       (artefact structure "image")
//! │       │   ├── 0001.png    ?frame
//! │       │   └── 0002.png
//! │       └── lbl/            fixed       (artefact structure "label")
//! │           └── 0001.json   ?frame
//! └── cam_left/
//!     └── ...
//! ```

pub mod availability;
pub mod category;
pub mod category_data;
pub mod checksum;
pub mod config;
pub mod error;
pub mod group;
pub mod node;
pub mod node_path;
pub mod pathvar;
pub mod products;
pub mod progress;
pub mod project;
pub mod structure;
pub mod view;

pub use availability::{AvailabilityReport, MissingValues, ProductAvailability};
pub use category::{Category, CategoryCollection, CategoryKind, CategoryValue};
pub use category_data::{CategoryData, PathDict};
pub use checksum::Checksum;
pub use config::{ProductionConfig, Settings};
pub use error::{ProductError, Result};
pub use group::{ArtefactType, Group};
pub use node::{Node, NodeId, NodeKind, NodePayload, Tree};
pub use node_path::ViewDimNodePath;
pub use pathvar::{PathVar, PathVarKind, SystemEntry, SystemHandler, SystemVarRegistry};
pub use products::{Products, ScanCache};
pub use progress::{LogProgress, NullProgress, ScanProgress};
pub use project::Project;
pub use structure::PathStructure;
pub use view::{ProductView, ViewDim, ViewDimKind};
