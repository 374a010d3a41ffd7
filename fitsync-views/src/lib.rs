//! fitsync-views - Reporting layer over the fitsync request layer.
//!
//! Turns per-user Fitbit responses into flat, indexed rows for a query or
//! reporting grid.
//!
//! ```text
//! ReportQuery { endpoint, users, params, units }
//!          ↓
//!   EndpointRegistry::get → render_path
//!          ↓
//!   ApiSession::fetch_with_units   (one per user, concurrently)
//!          ↓
//!   Endpoint::matches → Endpoint::project
//!          ↓
//! Report { rows: [ResultRow { index, user_id, values }], failures }
//! ```

pub mod report;

pub use report::{execute, Report, ReportFailure, ReportQuery, ResultRow};
