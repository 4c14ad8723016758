//! Statistical inference for two-arm experiments: binomial, continuous and
//! ratio tests, CUPED, multiple-testing correction, sequential alpha
//! spending, Bayesian win probabilities and SRM checks, composed by
//! [`engine::analyze`].

pub mod abn;
pub mod bayes;
pub mod binomial;
pub mod config;
pub mod continuous;
pub mod cuped;
pub mod dataset;
pub mod distributions;
pub mod engine;
pub mod error;
pub mod logging;
pub mod multiple;
pub mod planning;
pub mod ratio;
pub mod sequential;
pub mod srm;
pub mod validation;

pub use bayes::{BayesEngine, BayesResult, ConjugateBayes};
pub use binomial::{binomial_test, TestResult};
pub use config::{AnalysisConfig, MetricType, MultipleTesting, NanPolicy, SequentialPreset, Sidedness};
pub use dataset::{DataSchema, Dataset, RawTable};
pub use engine::{analyze, AnalysisResult, Engine};
pub use error::{AbError, Result, ValidationError};
pub use sequential::{
    make_sequential_plan, sequential_decision, SequentialDecision, SequentialPlan, StopEvent, StopNotifier,
};
pub use srm::{srm_check, SrmResult};
pub use validation::{infer_metric_type, validate_table};
