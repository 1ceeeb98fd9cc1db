//! # car-mpg-trainer: Fuel-Efficiency Regression Trainer
//!
//! **Version**: 0.1.0
//!
//! Trains a regressor that predicts a car's fuel efficiency (`mpg`) from eight
//! numeric attributes, scores it on a held-out split, and records the run in
//! a local experiment-tracking store.
//!
//! ## Components
//!
//! - [`storage`]: data-file discovery, CSV/Parquet loading into Arrow, the
//!   predictions table
//! - [`data`]: the Arrow-backed [`data::Dataset`] and the target split
//! - [`preprocessing`], [`boosting`], [`pipeline`]: standardization, the
//!   gradient-boosted tree ensemble, and their composition
//! - [`metrics`]: R² and RMSE
//! - [`experiment`]: runs, metrics, artifacts, and the model registry
//! - [`trainer`]: the end-to-end job
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use car_mpg_trainer::config::TrainConfig;
//! use car_mpg_trainer::experiment::FileTracker;
//! use car_mpg_trainer::trainer::Trainer;
//!
//! let config = TrainConfig::new("data/train", "data/test", "car-mpg");
//! let mut tracker = FileTracker::open("./mlruns")?;
//! let report = Trainer::new(config)?.run(&mut tracker)?;
//! println!("r2_score = {:.4}", report.score);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod boosting;
pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;
pub mod storage;
pub mod trainer;

pub use error::{Error, Result};
