//! End-to-end scenarios against the public `fedgc_core`/`fedgc_cli` API.

mod scenarios;
