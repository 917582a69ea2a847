//! End-to-end tests driving full ledger cycles over temp directories.

mod cycle;
mod fixtures;
