//! Trajectories and the state bundles scored alongside them.
//!
//! # Overview
//!
//! A scoring record consists of:
//! - **Messages**: the agent/environment conversation, in order
//! - **State**: final and ground-truth environment objects, the calls the
//!   agent executed successfully, and the dataset row with the reference answer
//!
//! # Usage
//!
//! ```rust,ignore
//! use reward_forge::trajectory::RecordStorage;
//!
//! let records = RecordStorage::new("records.jsonl").load_records().await?;
//! for record in &records {
//!     println!("{} turns", record.messages.len());
//! }
//! ```

pub mod storage;
pub mod types;

pub use storage::{parse_records, RecordStorage, ScoreRecord, ScoringRecord};
pub use types::{ArgValue, DatasetRow, Message, ModelCall, Role, StateBundle, SET_MARKER};
