mod client;
mod inference;
mod parser;

pub use client::{Classification, Classifier, ClassifierClient};
