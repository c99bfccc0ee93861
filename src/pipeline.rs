use crate::config::{Config, OutputConfig};
use crate::dataset::RawDatasetParser;
use crate::downsample::downsample;
use crate::error::Result;
use crate::field::FieldChannel;
use crate::metrics::saliency_mask;
use crate::normalize::{normalize_fields, normalize_microstructure, NormalizationConstants};
use crate::split::{split, Splits};
use crate::visualisation::FieldVisualiser;
use log::{info, warn};
use ndarray::{s, Axis};

/// Normalized, downsampled and split data plus the constants that invert the
/// normalization.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub splits: Splits,
    pub constants: NormalizationConstants,
}

/// parse -> normalize -> downsample -> split
pub fn prepare(config: &Config) -> Result<PreparedData> {
    let parser = RawDatasetParser::new(
        &config.dataset.root,
        config.dataset.time_steps,
        config.dataset.delta_t,
    )?;
    let dataset = parser.parse()?;
    info!(
        "Parsed {} case(s): microstructure {:?}, fields {:?}",
        dataset.cases(),
        dataset.microstructure.dim(),
        dataset.fields.dim()
    );

    let fields = normalize_fields(&dataset.fields, &dataset.constants)?;
    let micro = normalize_microstructure(&dataset.microstructure)?;

    let (micro, fields) = if config.downsample.enabled {
        downsample(&micro, &fields)?
    } else {
        (micro, fields)
    };

    let splits = split(&micro, &fields, config.split.proportions)?;
    info!("Finished processing data");
    Ok(PreparedData {
        splits,
        constants: dataset.constants,
    })
}

fn write_previews(prepared: &PreparedData, output: &OutputConfig) -> Result<()> {
    let Some(dir) = &output.preview_dir else {
        return Ok(());
    };
    let partition = [
        &prepared.splits.train,
        &prepared.splits.validation,
        &prepared.splits.test,
    ]
    .into_iter()
    .find(|p| !p.is_empty());
    let Some(partition) = partition else {
        warn!("No cases to preview");
        return Ok(());
    };

    let visualiser = FieldVisualiser::new(dir, output.image_width, output.image_height)?;
    let last = partition.fields.len_of(Axis(3)) - 1;
    let temperature = partition
        .fields
        .slice(s![0, .., .., last, FieldChannel::Temperature.index()]);
    let mask = saliency_mask(temperature, prepared.constants.temperature);
    let indicator = partition.microstructure.slice(s![0, .., .., 0]);

    let frames = [
        visualiser.plot_field(temperature, FieldChannel::Temperature.name(), last),
        visualiser.plot_mask(&mask, "hotspot", last),
        visualiser.plot_field(indicator, "microstructure", 0),
    ];
    for frame in frames {
        if let Err(e) = frame {
            warn!("Failed to visualise: {}", e);
        }
    }
    Ok(())
}

/// Prepares the dataset and writes the configured artefacts.
pub fn run(config: &Config) -> anyhow::Result<PreparedData> {
    let prepared = prepare(config)?;
    for (name, part) in [
        ("train", &prepared.splits.train),
        ("validation", &prepared.splits.validation),
        ("test", &prepared.splits.test),
    ] {
        info!(
            "{}: cases {:?}, microstructure {:?}, fields {:?}",
            name,
            part.cases,
            part.microstructure.dim(),
            part.fields.dim()
        );
    }

    if let Some(path) = &config.output.constants_path {
        prepared.constants.save(path)?;
        info!("Wrote normalization constants to {}", path.display());
    }
    write_previews(&prepared, &config.output)?;
    Ok(prepared)
}
