//! Model training module
//!
//! Provides the three classifier families used for failure-mode prediction:
//! - Random Forest (bagged Gini trees)
//! - XGBoost-style boosting (depth-wise, second-order)
//! - LightGBM-style boosting (leaf-wise, histogram based)
//!
//! plus stratified cross-validation and the multi-model training stage.

mod boosting;
mod config;
mod models;
mod trainer;
pub mod cross_validation;
pub mod decision_tree;
pub mod random_forest;
pub mod xgboost;
pub mod lightgbm;

pub use config::{ModelFamily, TrainingConfig};
pub use models::{Classifier, Model, ModelConfig};
pub(crate) use models::argmax;
pub use trainer::{cross_validate, Candidate, CvScore, ModelTrainer, TrainedCandidates};
pub use cross_validation::{class_indices, train_test_split_stratified, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForestClassifier, RandomForestConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
pub use lightgbm::{LightGBMClassifier, LightGBMConfig};
