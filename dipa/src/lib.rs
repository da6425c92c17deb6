// Normalization planning workflow
pub mod normalize;
