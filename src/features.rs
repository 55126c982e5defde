//! Weighted bag-of-words features.
//!
//! A [`FeatureVocabulary`] is fitted once on a corpus and then maps any text
//! to a sparse [`FeatureVector`] whose components are
//! term-frequency × inverse-document-frequency. The same vocabulary must be
//! used at training and prediction time, which is why it is persisted next
//! to the classifier it was trained with.

pub mod projection;
pub mod vector;
pub mod vocabulary;

pub use projection::PrincipalProjection;
pub use vector::FeatureVector;
pub use vocabulary::{FeatureVocabulary, VocabularyConfig};
