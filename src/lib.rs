//! treasury-audit: treasury reconciliation and flag scoring
//!
//! Reconciles per-epoch treasury balances against the protocol inflow
//! model, links on-chain and off-chain funding records into one ledger,
//! and scores the result into persistent, evidence-backed flags.
//!
//! Stage order: `snapshot` → `estimator` → `reconcile` → `aggregate`,
//! `linker` → `flags`, with `registry` and `validate` reporting over the
//! same inputs. `pipeline` drives a run; `cli` is the binary surface.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod estimator;
pub mod flags;
pub mod linker;
pub mod money;
pub mod observability;
pub mod pipeline;
pub mod provenance;
pub mod reconcile;
pub mod registry;
pub mod snapshot;
pub mod validate;
