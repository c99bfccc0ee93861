use crate::error::{ParcError, Result};
use log::info;
use ndarray::{s, Array4, Array5, Axis};
use std::ops::Range;

/// One contiguous slice of cases.
#[derive(Debug, Clone)]
pub struct Partition {
    pub cases: Range<usize>,
    pub microstructure: Array4<f64>,
    pub fields: Array5<f64>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Splits {
    pub train: Partition,
    pub validation: Partition,
    pub test: Partition,
}

impl Splits {
    /// (train micro, train fields, val micro, val fields, test micro, test fields)
    #[allow(clippy::type_complexity)]
    pub fn into_tensors(
        self,
    ) -> (
        Array4<f64>,
        Array5<f64>,
        Array4<f64>,
        Array5<f64>,
        Array4<f64>,
        Array5<f64>,
    ) {
        (
            self.train.microstructure,
            self.train.fields,
            self.validation.microstructure,
            self.validation.fields,
            self.test.microstructure,
            self.test.fields,
        )
    }
}

/// Case ranges for train, validation and test.
///
/// Boundaries are running sums of `cases * p` truncated to integers, so the
/// slices never overlap. Proportions are not validated: ones that sum past 1
/// are clamped to the case count, negative ones collapse a slice to empty.
pub fn boundaries(cases: usize, proportions: [f64; 3]) -> [Range<usize>; 3] {
    let n = cases as f64;
    let train = n * proportions[0];
    let valid = train + n * proportions[1];
    let test = valid + n * proportions[2];

    let clamp = |x: f64| (x.max(0.0) as usize).min(cases);
    let train_end = clamp(train);
    let valid_end = clamp(valid).max(train_end);
    let test_end = clamp(test).max(valid_end);
    [0..train_end, train_end..valid_end, valid_end..test_end]
}

fn partition(micro: &Array4<f64>, fields: &Array5<f64>, cases: Range<usize>) -> Partition {
    Partition {
        microstructure: micro.slice(s![cases.clone(), .., .., ..]).to_owned(),
        fields: fields.slice(s![cases.clone(), .., .., .., ..]).to_owned(),
        cases,
    }
}

pub fn split(micro: &Array4<f64>, fields: &Array5<f64>, proportions: [f64; 3]) -> Result<Splits> {
    let cases = fields.len_of(Axis(0));
    if micro.len_of(Axis(0)) != cases {
        return Err(ParcError::shape(
            "microstructure case count",
            cases,
            micro.len_of(Axis(0)),
        ));
    }

    let [train, validation, test] = boundaries(cases, proportions);
    info!(
        "Split {} cases: train {:?}, validation {:?}, test {:?}",
        cases, train, validation, test
    );
    Ok(Splits {
        train: partition(micro, fields, train),
        validation: partition(micro, fields, validation),
        test: partition(micro, fields, test),
    })
}
