use std::collections::VecDeque;
use std::fmt;

use crate::shared::constants::AGE_BINS;
use crate::shared::error::PipelineError;

use super::age_gender_predictor::RawPrediction;

pub const DEFAULT_MAX_STORE: usize = 5;

/// Mean female probability above which a face is labelled female.
const FEMALE_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Strictly greater than 0.5 is female; exactly 0.5 is male.
    pub fn from_probability(female_prob: f64) -> Self {
        if female_prob > FEMALE_THRESHOLD {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn initial(&self) -> char {
        match self {
            Gender::Male => 'M',
            Gender::Female => 'F',
        }
    }
}

/// Averaged estimate for one face index of the current cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmoothedLabel {
    pub age: u32,
    pub gender: Gender,
}

impl fmt::Display for SmoothedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.age, self.gender.initial())
    }
}

/// Sliding-window average of per-cycle prediction batches.
///
/// Each stored entry is one cycle's whole batch, so the age and gender
/// histories always have the same length. Averaging is positional: index
/// `i` of the current batch is averaged with index `i` of every stored
/// batch that has one, whether or not it is the same physical face.
pub struct PredictionSmoother {
    max_store: usize,
    history: VecDeque<Vec<RawPrediction>>,
}

impl PredictionSmoother {
    pub fn new(max_store: usize) -> Result<Self, PipelineError> {
        if max_store == 0 {
            return Err(PipelineError::invalid("max_store must be at least 1"));
        }
        Ok(Self {
            max_store,
            history: VecDeque::with_capacity(max_store + 1),
        })
    }

    pub fn max_store(&self) -> usize {
        self.max_store
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Records this cycle's batch and returns one label per face in it.
    ///
    /// Callers must skip cycles without faces; an empty batch is rejected
    /// so that such bugs surface instead of silently ageing the window.
    pub fn update(
        &mut self,
        raw_batch: Vec<RawPrediction>,
    ) -> Result<Vec<SmoothedLabel>, PipelineError> {
        if raw_batch.is_empty() {
            return Err(PipelineError::invalid(
                "prediction smoother updated with an empty batch",
            ));
        }

        let faces = raw_batch.len();
        self.history.push_back(raw_batch);
        while self.history.len() > self.max_store {
            self.history.pop_front();
        }

        Ok((0..faces).map(|i| self.label_for(i)).collect())
    }

    fn label_for(&self, index: usize) -> SmoothedLabel {
        let mut dist_sum = [0.0f64; AGE_BINS];
        let mut gender_sum = 0.0f64;
        let mut count = 0usize;

        for prediction in self.history.iter().filter_map(|batch| batch.get(index)) {
            for (acc, &p) in dist_sum.iter_mut().zip(prediction.age_distribution.iter()) {
                *acc += p as f64;
            }
            gender_sum += prediction.gender_prob as f64;
            count += 1;
        }

        // The current batch always holds `index`, so count >= 1.
        let n = count as f64;
        let expected_age: f64 = dist_sum
            .iter()
            .enumerate()
            .map(|(age, &mass)| age as f64 * mass / n)
            .sum();

        SmoothedLabel {
            age: expected_age.round().max(0.0) as u32,
            gender: Gender::from_probability(gender_sum / n),
        }
    }
}

impl Default for PredictionSmoother {
    fn default() -> Self {
        Self {
            max_store: DEFAULT_MAX_STORE,
            history: VecDeque::with_capacity(DEFAULT_MAX_STORE + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn face(gender_prob: f32, age: usize) -> RawPrediction {
        RawPrediction::one_hot(gender_prob, age)
    }

    fn label(age: u32, gender: Gender) -> SmoothedLabel {
        SmoothedLabel { age, gender }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            PredictionSmoother::new(0),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_default_capacity() {
        let smoother = PredictionSmoother::default();
        assert_eq!(smoother.max_store(), 5);
        assert_eq!(smoother.history_len(), 0);
    }

    #[test]
    fn test_empty_batch_is_precondition_violation() {
        let mut smoother = PredictionSmoother::default();
        let err = smoother.update(vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
        assert_eq!(smoother.history_len(), 0);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(37)]
    #[case(100)]
    fn test_one_hot_age_is_exact(#[case] age: usize) {
        let mut smoother = PredictionSmoother::default();
        let labels = smoother.update(vec![face(0.1, age)]).unwrap();
        assert_eq!(labels[0].age, age as u32);
    }

    #[test]
    fn test_age_is_rounded_expectation() {
        let mut dist = [0.0; AGE_BINS];
        dist[20] = 0.5;
        dist[31] = 0.5;
        let mut smoother = PredictionSmoother::default();
        let labels = smoother.update(vec![RawPrediction::new(0.0, dist)]).unwrap();
        // 10 + 15.5 = 25.5 → 26
        assert_eq!(labels[0].age, 26);
    }

    #[rstest]
    #[case(0.5, Gender::Male)]
    #[case(0.0, Gender::Male)]
    #[case(0.49, Gender::Male)]
    #[case(0.51, Gender::Female)]
    #[case(1.0, Gender::Female)]
    fn test_gender_threshold(#[case] prob: f32, #[case] expected: Gender) {
        let mut smoother = PredictionSmoother::default();
        let labels = smoother.update(vec![face(prob, 30)]).unwrap();
        assert_eq!(labels[0].gender, expected);
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut smoother = PredictionSmoother::new(3).unwrap();
        for i in 0..10 {
            smoother.update(vec![face(0.2, i)]).unwrap();
            assert!(smoother.history_len() <= 3);
        }
        assert_eq!(smoother.history_len(), 3);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut smoother = PredictionSmoother::new(5).unwrap();
        // First batch: age 100, female. Then age 0, male.
        smoother.update(vec![face(1.0, 100)]).unwrap();
        let mut labels = Vec::new();
        for _ in 0..4 {
            labels = smoother.update(vec![face(0.0, 0)]).unwrap();
        }
        // Fifth update: the window still holds the first batch.
        assert_eq!(labels[0], label(20, Gender::Male));

        let labels = smoother.update(vec![face(0.0, 0)]).unwrap();
        // Sixth update evicted it.
        assert_eq!(labels[0], label(0, Gender::Male));
        assert_eq!(smoother.history_len(), 5);
    }

    #[test]
    fn test_repeated_batch_yields_its_own_label() {
        let batch = vec![face(0.8, 25), face(0.3, 61)];
        let mut smoother = PredictionSmoother::default();
        let mut labels = Vec::new();
        for _ in 0..smoother.max_store() {
            labels = smoother.update(batch.clone()).unwrap();
        }
        assert_eq!(labels, vec![label(25, Gender::Female), label(61, Gender::Male)]);
    }

    #[test]
    fn test_running_average_over_window() {
        let mut smoother = PredictionSmoother::default();
        smoother.update(vec![face(1.0, 10)]).unwrap();
        let labels = smoother.update(vec![face(0.0, 30)]).unwrap();
        // mean age 20; mean gender 0.5 → Male
        assert_eq!(labels[0], label(20, Gender::Male));
    }

    #[test]
    fn test_one_label_per_current_face() {
        let mut smoother = PredictionSmoother::default();
        smoother
            .update(vec![face(0.9, 20), face(0.9, 20), face(0.9, 20)])
            .unwrap();
        let labels = smoother.update(vec![face(0.1, 40)]).unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_shorter_batches_do_not_contribute_to_higher_indices() {
        let mut smoother = PredictionSmoother::default();
        smoother.update(vec![face(0.0, 10)]).unwrap();
        smoother.update(vec![face(0.0, 10)]).unwrap();
        let labels = smoother
            .update(vec![face(0.0, 30), face(1.0, 80)])
            .unwrap();
        // Index 0 averages three entries: (10 + 10 + 30) / 3 = 16.67 → 17
        assert_eq!(labels[0], label(17, Gender::Male));
        // Index 1 only exists in the current batch.
        assert_eq!(labels[1], label(80, Gender::Female));
    }

    #[test]
    fn test_averaging_is_positional_not_by_identity() {
        let mut smoother = PredictionSmoother::default();
        // Two faces: slot 0 is a 20-year-old, slot 1 a 60-year-old.
        smoother.update(vec![face(0.0, 20), face(1.0, 60)]).unwrap();
        // The 20-year-old leaves; the 60-year-old is now reported at slot 0.
        let labels = smoother.update(vec![face(1.0, 60)]).unwrap();
        // Slot 0 mixes both people: (20 + 60) / 2 = 40, gender mean 0.5.
        assert_eq!(labels[0], label(40, Gender::Male));
    }

    #[test]
    fn test_label_display() {
        assert_eq!(label(34, Gender::Female).to_string(), "34, F");
        assert_eq!(label(7, Gender::Male).to_string(), "7, M");
    }
}
