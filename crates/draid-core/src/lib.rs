//! dRAID geometry and I/O mapping: permutation maps, logical/physical
//! address translation, stripe construction, child dispatch, distributed
//! spare resolution, and degradation queries.
//!
//! This crate is the geometry half of the engine; [`draid_parity`] owns
//! the sealed GF(2^8) codec it calls into, and [`draid_vfs`] supplies
//! the child I/O abstraction it dispatches through.

pub mod config;
pub mod degrade_oracle;
pub mod dispatcher;
pub mod fletcher4;
pub mod mapper;
pub mod perm_map;
pub(crate) mod perm_table;
pub mod queries;
pub mod spare_router;
pub mod stripe_builder;

pub use config::Config;
pub use degrade_oracle::DegradeOracle;
pub use dispatcher::Dispatcher;
pub use mapper::{GroupPlacement, Mapper};
pub use perm_map::PermMap;
pub use queries::Queries;
pub use spare_router::{ParentOperator, SpareRouter, SyntheticLabel};
pub use stripe_builder::StripeBuilder;
