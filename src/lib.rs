//! Data preparation and recurrent field integration for PARC, a
//! physics-aware model that predicts temperature and pressure evolution from
//! a microstructure image.

pub mod config;
pub mod constants;
pub mod conv;
pub mod dataset;
pub mod downsample;
pub mod error;
pub mod field;
pub mod grid;
pub mod integrator;
pub mod layout;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod split;
pub mod visualisation;
pub mod wave_map;

pub use dataset::{parse, Dataset, RawDatasetParser};
pub use error::{ParcError, Result};
pub use field::FieldChannel;
pub use integrator::{FieldTransform, RecurrentIntegrator, Trajectory};
pub use layout::{LayoutVariant, LayoutVersion};
pub use normalize::{ChannelRange, NormalizationConstants};
